use super::binary::ModuleExpectation;
use super::progress::{PhaseProgress, ProgressPhase, ProgressSink};
use super::source::ArtifactSource;
use crate::config::ArtifactsConfig;
use crate::error::CastorError;
use futures::{StreamExt, stream::FuturesUnordered};
use tracing::{debug, info};

/// Names of every artifact one bootstrap attempt loads.
#[derive(Debug, Clone)]
pub struct ArtifactPlan {
    pub engine: String,
    pub engine_expectation: ModuleExpectation,
    pub backend: String,
    pub fs_bundle: String,
    pub vector_extension: Option<String>,
}

impl From<&ArtifactsConfig> for ArtifactPlan {
    fn from(cfg: &ArtifactsConfig) -> Self {
        Self {
            engine: cfg.engine.clone(),
            engine_expectation: ModuleExpectation {
                sha256: cfg.engine_sha256.clone(),
            },
            backend: cfg.backend.clone(),
            fs_bundle: cfg.fs_bundle.clone(),
            vector_extension: cfg.vector_extension.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedArtifact {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// The complete supporting set. Only ever built when every load succeeded.
#[derive(Debug, Clone)]
pub struct Dependencies {
    pub backend: LoadedArtifact,
    pub vector_ext: Option<LoadedArtifact>,
    pub fs_bundle: LoadedArtifact,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Backend,
    VectorExt,
    FsBundle,
}

/// Loads all dependencies concurrently, reporting `dependencies` progress as each completes.
///
/// The first failure aborts the whole set; outstanding loads are dropped.
pub async fn load_dependencies(
    source: &dyn ArtifactSource,
    plan: &ArtifactPlan,
    sink: Option<ProgressSink>,
) -> Result<Dependencies, CastorError> {
    let mut progress = PhaseProgress::start(ProgressPhase::Dependencies, sink);

    let mut wanted = vec![
        (Slot::Backend, plan.backend.clone()),
        (Slot::FsBundle, plan.fs_bundle.clone()),
    ];
    if let Some(vector) = plan.vector_extension.as_ref() {
        wanted.push((Slot::VectorExt, vector.clone()));
    }
    let total = u64::try_from(wanted.len()).unwrap_or(u64::MAX);

    let mut pending: FuturesUnordered<_> = wanted
        .into_iter()
        .map(|(slot, name)| async move {
            let result = fetch_whole(source, &name).await;
            (slot, name, result)
        })
        .collect();

    let mut backend = None;
    let mut vector_ext = None;
    let mut fs_bundle = None;
    let mut completed: u64 = 0;

    while let Some((slot, name, result)) = pending.next().await {
        let bytes = result.map_err(|e| CastorError::DependencyLoad {
            artifact: name.clone(),
            message: e.to_string(),
        })?;
        debug!(artifact = %name, size = bytes.len(), "Dependency loaded");

        completed += 1;
        progress.report_ratio(completed, total);

        let loaded = LoadedArtifact { name, bytes };
        match slot {
            Slot::Backend => backend = Some(loaded),
            Slot::VectorExt => vector_ext = Some(loaded),
            Slot::FsBundle => fs_bundle = Some(loaded),
        }
    }

    let (Some(backend), Some(fs_bundle)) = (backend, fs_bundle) else {
        return Err(CastorError::UnexpectedError(
            "dependency set incomplete after all loads finished".to_string(),
        ));
    };

    let cost_ms = progress.finish();
    info!(count = total, cost_ms, "Dependencies loaded");

    Ok(Dependencies {
        backend,
        vector_ext,
        fs_bundle,
    })
}

async fn fetch_whole(source: &dyn ArtifactSource, name: &str) -> Result<Vec<u8>, CastorError> {
    let mut stream = source.open(name).await?;
    let mut buf = Vec::new();
    while let Some(chunk) = stream.chunks.next().await {
        buf.extend_from_slice(&chunk?);
    }
    if let Some(total) = stream.total
        && u64::try_from(buf.len()).ok() != Some(total)
    {
        return Err(CastorError::transport(
            name,
            format!("received {} of {total} bytes", buf.len()),
        ));
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{ProgressEvent, StaticArtifactSource};
    use std::sync::{Arc, Mutex};

    fn plan(vector: Option<&str>) -> ArtifactPlan {
        ArtifactPlan {
            engine: "engine.wasm".to_string(),
            engine_expectation: ModuleExpectation::default(),
            backend: "backend.bin".to_string(),
            fs_bundle: "fs.data".to_string(),
            vector_extension: vector.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn loads_full_set_and_reports_each_completion() {
        let source = StaticArtifactSource::new()
            .with_bytes("backend.bin", b"backend".to_vec())
            .with_bytes("fs.data", Vec::new())
            .with_bytes("vec.so", b"vector".to_vec());
        let seen: Arc<Mutex<Vec<ProgressEvent>>> = Arc::default();
        let sink_seen = seen.clone();
        let sink: ProgressSink = Arc::new(move |e| sink_seen.lock().unwrap().push(e));

        let deps = load_dependencies(&source, &plan(Some("vec.so")), Some(sink))
            .await
            .expect("all dependencies load");

        assert_eq!(deps.backend.bytes, b"backend");
        assert_eq!(deps.vector_ext.map(|v| v.bytes), Some(b"vector".to_vec()));
        assert!(deps.fs_bundle.bytes.is_empty());

        let events = seen.lock().unwrap().clone();
        let values: Vec<u8> = events.iter().map(|e| e.progress).collect();
        assert_eq!(values, vec![33, 67, 100, 100]);
        assert!(events.last().unwrap().cost_time.is_some());
        assert!(events.iter().all(|e| e.phase == ProgressPhase::Dependencies));
    }

    #[tokio::test]
    async fn one_failure_fails_the_set() {
        let source = StaticArtifactSource::new()
            .with_bytes("backend.bin", b"backend".to_vec())
            .with_failure("fs.data", "network down");

        let err = load_dependencies(&source, &plan(None), None)
            .await
            .expect_err("missing bundle fails the set");

        match err {
            CastorError::DependencyLoad { artifact, message } => {
                assert_eq!(artifact, "fs.data");
                assert!(message.contains("network down"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn truncated_dependency_is_rejected() {
        let source = StaticArtifactSource::new()
            .with_chunks("backend.bin", Some(10), vec![b"short".to_vec()])
            .with_bytes("fs.data", Vec::new());

        let err = load_dependencies(&source, &plan(None), None)
            .await
            .expect_err("truncated backend fails");
        assert_eq!(err.kind(), "DependencyLoadError");
    }
}
