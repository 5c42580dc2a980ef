use super::diagnostics::ErrorDiagnostics;
use super::state::LoadingState;
use crate::loader::{ProgressEvent, ProgressSink};
use std::sync::Arc;

pub type StateCallback = Arc<dyn Fn(LoadingState) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&ErrorDiagnostics) + Send + Sync>;

/// Observers for one bootstrap attempt. Every member is optional.
#[derive(Clone, Default)]
pub struct BootstrapCallbacks {
    pub on_progress: Option<ProgressSink>,
    pub on_state_change: Option<StateCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl BootstrapCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(mut self, f: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn on_state_change(mut self, f: impl Fn(LoadingState) + Send + Sync + 'static) -> Self {
        self.on_state_change = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&ErrorDiagnostics) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn state_changed(&self, state: LoadingState) {
        if let Some(cb) = &self.on_state_change {
            cb(state);
        }
    }

    pub(crate) fn failed(&self, diagnostics: &ErrorDiagnostics) {
        if let Some(cb) = &self.on_error {
            cb(diagnostics);
        }
    }
}
