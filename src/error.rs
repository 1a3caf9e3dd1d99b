//! Engine-wide error type
//!
//! Every fallible operation in the crate returns [`EngineResult`]. Startup
//! failures (no device, missing kernel source) are fatal and are propagated to
//! the binary, which aborts. Snapshot I/O failures are recoverable and are
//! usually logged and replaced by a default state at the call site.

use std::path::PathBuf;

/// Result alias used across the engine
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors produced by the simulation engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Compute backend unavailable: {message}")]
    BackendUnavailable { message: String },

    #[error("Kernel source missing: {path}")]
    KernelSourceMissing { path: PathBuf },

    #[error("Shader compilation failed: {shader}: {error}")]
    ShaderCompilation { shader: String, error: String },

    #[error("Backend buffers sized for {prepared} particles but step received {requested}")]
    BufferSizeMismatch { prepared: usize, requested: usize },

    #[error("Compute backend already closed")]
    BackendClosed,

    #[error("GPU readback failed: {message}")]
    GpuReadback { message: String },

    #[error("Particle arrays disagree on count: {field} has {found}, expected {expected}")]
    ParticleCountMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupted snapshot: {0}")]
    CorruptedSnapshot(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<bincode::Error> for EngineError {
    fn from(err: bincode::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

/// Helper trait attaching backend context to foreign errors
pub trait BackendErrorContext<T> {
    fn backend_context(self, context: &str) -> EngineResult<T>;
}

impl<T, E> BackendErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn backend_context(self, context: &str) -> EngineResult<T> {
        self.map_err(|e| EngineError::GpuReadback {
            message: format!("{}: {}", context, e),
        })
    }
}
