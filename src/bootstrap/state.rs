use serde::{Deserialize, Serialize};

/// Bootstrap progress of the process-wide database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadingState {
    Initializing,
    LoadingDependencies,
    LoadingWasm,
    Migrating,
    Finished,
    Ready,
    Error,
}

impl LoadingState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadingState::Ready | LoadingState::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_camel_case() {
        assert_eq!(
            serde_json::to_value(LoadingState::LoadingDependencies).unwrap(),
            serde_json::json!("loadingDependencies")
        );
        assert_eq!(
            serde_json::to_value(LoadingState::LoadingWasm).unwrap(),
            serde_json::json!("loadingWasm")
        );
    }

    #[test]
    fn only_ready_and_error_are_terminal() {
        assert!(LoadingState::Ready.is_terminal());
        assert!(LoadingState::Error.is_terminal());
        assert!(!LoadingState::Finished.is_terminal());
    }
}
