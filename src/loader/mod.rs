//! Staged artifact loading: the engine binary and its supporting dependencies.
//!
//! Both loaders stream from an [`ArtifactSource`] and report progress through a
//! [`ProgressSink`]; the bootstrap runs them concurrently and joins on both.

mod binary;
mod dependencies;
mod progress;
mod source;

pub use binary::{CompiledModule, ModuleExpectation, load_binary, load_binary_stream};
pub use dependencies::{ArtifactPlan, Dependencies, LoadedArtifact, load_dependencies};
pub use progress::{PhaseProgress, ProgressEvent, ProgressPhase, ProgressSink};
pub use source::{
    ArtifactSource, ArtifactStream, ChunkStream, HttpArtifactSource, StaticArtifactSource,
};
