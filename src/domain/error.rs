//! Domain error types.

/// Top-level error type for dipladder.
///
/// Row-level problems never show up here: the normalizer reports them as
/// [`SkipReason`](crate::domain::normalizer::SkipReason) values and keeps going.
#[derive(Debug, thiserror::Error)]
pub enum DipLadderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("failed to read price data: {reason}")]
    DataRead { reason: String },

    #[error("failed to fetch {symbol}: {reason}")]
    DataFetch { symbol: String, reason: String },

    #[error("publish error for {path}: {reason}")]
    Publish { path: String, reason: String },

    #[error("missing credential: {name} is not set")]
    MissingCredential { name: String },

    #[error("{failed} buy signals failed")]
    SignalMismatch { failed: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&DipLadderError> for std::process::ExitCode {
    fn from(err: &DipLadderError) -> Self {
        let code: u8 = match err {
            DipLadderError::Io(_) | DipLadderError::DataRead { .. } => 1,
            DipLadderError::ConfigParse { .. }
            | DipLadderError::ConfigMissing { .. }
            | DipLadderError::ConfigInvalid { .. } => 2,
            DipLadderError::DataFetch { .. }
            | DipLadderError::Publish { .. }
            | DipLadderError::MissingCredential { .. } => 3,
            DipLadderError::SignalMismatch { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
