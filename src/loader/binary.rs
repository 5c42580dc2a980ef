use super::progress::{PhaseProgress, ProgressPhase, ProgressSink};
use super::source::{ArtifactSource, ArtifactStream};
use crate::error::CastorError;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

const WASM_MAGIC: &[u8; 4] = b"\0asm";
const WASM_VERSION: u32 = 1;
/// Upper bound for pre-allocating from an advertised length.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Checks applied when compiling the engine module.
#[derive(Debug, Clone, Default)]
pub struct ModuleExpectation {
    /// Lowercase hex SHA-256 the module must match.
    pub sha256: Option<String>,
}

/// A validated engine module, ready to be instantiated.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    name: String,
    version: u32,
    digest: String,
    bytes: Arc<[u8]>,
}

impl CompiledModule {
    /// Validates a contiguous module buffer.
    ///
    /// Truncated or corrupted buffers fail here instead of producing a partial module.
    pub fn compile(
        name: &str,
        bytes: Vec<u8>,
        expectation: &ModuleExpectation,
    ) -> Result<Self, CastorError> {
        if bytes.len() < 8 {
            return Err(CastorError::Compile(format!(
                "`{name}` is {} bytes, shorter than a module header",
                bytes.len()
            )));
        }
        if &bytes[..4] != WASM_MAGIC {
            return Err(CastorError::Compile(format!(
                "`{name}` does not start with the wasm magic number"
            )));
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != WASM_VERSION {
            return Err(CastorError::Compile(format!(
                "`{name}` has unsupported module version {version}"
            )));
        }

        let digest = format!("{:x}", Sha256::digest(&bytes));
        if let Some(expected) = expectation.sha256.as_deref()
            && !expected.eq_ignore_ascii_case(&digest)
        {
            return Err(CastorError::Compile(format!(
                "`{name}` digest mismatch: expected {expected}, got {digest}"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            version,
            digest,
            bytes: bytes.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Opens `name` on `source` and compiles it, reporting `wasm` progress.
pub async fn load_binary(
    source: &dyn ArtifactSource,
    name: &str,
    expectation: &ModuleExpectation,
    sink: Option<ProgressSink>,
) -> Result<CompiledModule, CastorError> {
    let progress = PhaseProgress::start(ProgressPhase::Wasm, sink);
    let stream = source.open(name).await?;
    load_binary_stream(name, stream, expectation, progress).await
}

/// Drains an already-opened module stream into one buffer and compiles it.
pub async fn load_binary_stream(
    name: &str,
    stream: ArtifactStream,
    expectation: &ModuleExpectation,
    mut progress: PhaseProgress,
) -> Result<CompiledModule, CastorError> {
    let ArtifactStream { total, mut chunks } = stream;
    let prealloc = total.unwrap_or(0).min(MAX_PREALLOC);
    let mut buf = Vec::with_capacity(usize::try_from(prealloc).unwrap_or(0));
    let mut received: u64 = 0;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        received = received.saturating_add(u64::try_from(chunk.len()).unwrap_or(u64::MAX));
        buf.extend_from_slice(&chunk);
        if let Some(total) = total {
            progress.report_ratio(received, total);
        }
        debug!(artifact = name, received, total = ?total, "Engine module chunk received");
    }

    if let Some(total) = total
        && received != total
    {
        return Err(CastorError::Compile(format!(
            "`{name}` body length {received} does not match advertised length {total}"
        )));
    }

    let module = CompiledModule::compile(name, buf, expectation)?;
    let cost_ms = progress.finish();
    info!(
        artifact = name,
        size = module.size(),
        digest = %module.digest(),
        cost_ms,
        "Engine module compiled"
    );
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_bytes(len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        bytes[..4].copy_from_slice(WASM_MAGIC);
        bytes[4..8].copy_from_slice(&WASM_VERSION.to_le_bytes());
        bytes
    }

    #[test]
    fn compile_accepts_valid_header() {
        let m = CompiledModule::compile("engine.wasm", module_bytes(32), &ModuleExpectation::default())
            .expect("valid module");
        assert_eq!(m.version(), 1);
        assert_eq!(m.size(), 32);
        assert_eq!(m.digest().len(), 64);
    }

    #[test]
    fn compile_rejects_short_and_corrupted_buffers() {
        let none = ModuleExpectation::default();
        assert!(matches!(
            CompiledModule::compile("e", vec![0, 97], &none),
            Err(CastorError::Compile(_))
        ));

        let mut corrupted = module_bytes(16);
        corrupted[1] = b'x';
        assert!(matches!(
            CompiledModule::compile("e", corrupted, &none),
            Err(CastorError::Compile(_))
        ));

        let mut wrong_version = module_bytes(16);
        wrong_version[4] = 2;
        assert!(matches!(
            CompiledModule::compile("e", wrong_version, &none),
            Err(CastorError::Compile(_))
        ));
    }

    #[test]
    fn compile_enforces_digest_pin() {
        let bytes = module_bytes(16);
        let digest = format!("{:x}", Sha256::digest(&bytes));

        let pinned = ModuleExpectation {
            sha256: Some(digest.to_uppercase()),
        };
        assert!(CompiledModule::compile("e", bytes.clone(), &pinned).is_ok());

        let wrong = ModuleExpectation {
            sha256: Some("00".repeat(32)),
        };
        assert!(matches!(
            CompiledModule::compile("e", bytes, &wrong),
            Err(CastorError::Compile(_))
        ));
    }
}
