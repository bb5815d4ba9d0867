use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxCastError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("No speech engine available")]
    NoEngineAvailable,

    #[error("An utterance is already in flight")]
    Busy,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

/// Errors reported by engine adapters.
///
/// These never cross the public boundary of the facade for asynchronous
/// playback failures; those surface as the `BackendError` state plus a
/// retrievable reason instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine not available: {reason}")]
    NotAvailable { reason: String },

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Operation not supported by this engine: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoxCastError {
    /// Whether the error leaves the instance permanently unusable.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            VoxCastError::NoEngineAvailable | VoxCastError::Fatal(_)
        )
    }
}
