use crate::config::ArtifactsConfig;
use crate::error::CastorError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::{collections::HashMap, time::Duration};
use tracing::debug;
use url::Url;

pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, CastorError>>;

/// An opened artifact: advertised size (if any) plus its body as chunks.
pub struct ArtifactStream {
    pub total: Option<u64>,
    pub chunks: ChunkStream,
}

/// Where artifacts come from.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn open(&self, name: &str) -> Result<ArtifactStream, CastorError>;
}

/// Fetches artifacts over HTTP(S), resolving names against a base URL.
#[derive(Clone)]
pub struct HttpArtifactSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpArtifactSource {
    pub fn new(cfg: &ArtifactsConfig) -> Result<Self, CastorError> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .connect_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = cfg.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: cfg.base_url.clone(),
        })
    }

    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn open(&self, name: &str) -> Result<ArtifactStream, CastorError> {
        let url = self.base_url.join(name)?;
        debug!(artifact = name, url = %url, "Fetching artifact");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CastorError::transport(name, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CastorError::transport(
                name,
                format!("unexpected status {status}"),
            ));
        }

        let artifact = name.to_string();
        let total = resp.content_length();
        let chunks = resp
            .bytes_stream()
            .map(move |chunk| {
                chunk
                    .map(|b| b.to_vec())
                    .map_err(|e| CastorError::transport(&artifact, e))
            })
            .boxed();

        Ok(ArtifactStream { total, chunks })
    }
}

enum StaticEntry {
    Chunks { total: Option<u64>, chunks: Vec<Vec<u8>> },
    Failure(String),
}

/// Serves artifacts held in memory: bundled binaries, or scripted sources in tests.
#[derive(Default)]
pub struct StaticArtifactSource {
    entries: HashMap<String, StaticEntry>,
}

impl StaticArtifactSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an artifact served as a single chunk with an exact size.
    pub fn with_bytes(self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let total = u64::try_from(bytes.len()).ok();
        self.with_chunks(name, total, vec![bytes])
    }

    /// Registers an artifact served chunk by chunk with an advertised `total`.
    pub fn with_chunks(
        mut self,
        name: impl Into<String>,
        total: Option<u64>,
        chunks: Vec<Vec<u8>>,
    ) -> Self {
        self.entries
            .insert(name.into(), StaticEntry::Chunks { total, chunks });
        self
    }

    /// Registers an artifact whose load fails with a transport error.
    pub fn with_failure(mut self, name: impl Into<String>, message: impl Into<String>) -> Self {
        self.entries
            .insert(name.into(), StaticEntry::Failure(message.into()));
        self
    }
}

#[async_trait]
impl ArtifactSource for StaticArtifactSource {
    async fn open(&self, name: &str) -> Result<ArtifactStream, CastorError> {
        match self.entries.get(name) {
            Some(StaticEntry::Chunks { total, chunks }) => Ok(ArtifactStream {
                total: *total,
                chunks: stream::iter(chunks.clone().into_iter().map(Ok)).boxed(),
            }),
            Some(StaticEntry::Failure(message)) => Err(CastorError::transport(name, message)),
            None => Err(CastorError::transport(name, "artifact not found")),
        }
    }
}
