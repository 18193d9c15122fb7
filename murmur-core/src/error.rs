use thiserror::Error;

/// All errors produced by murmur-core.
#[derive(Debug, Error)]
pub enum MurmurError {
    /// Bad or missing declared tensor shape/dtype, or invalid frontend
    /// dimensions.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("audio too short: {got} samples, need at least {need}")]
    InsufficientAudio { got: usize, need: usize },

    #[error("unsupported input tensor layout: {0:?}")]
    UnsupportedLayout(Vec<i64>),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("vocabulary error: {0}")]
    Vocabulary(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MurmurError {
    /// Fixed status line a caller surfaces for this error kind.
    ///
    /// The previous transcript, if any, is left untouched by the caller;
    /// this string replaces the status display only.
    pub fn status_message(&self) -> &'static str {
        match self {
            Self::Config(_) => "Model configuration is invalid.",
            Self::InsufficientAudio { .. } => "Recording was too short to transcribe.",
            Self::UnsupportedLayout(_) => "Model input layout is not supported.",
            Self::Decode(_) => "Could not decode the model output.",
            Self::Vocabulary(_) => "Vocabulary file is missing or unreadable.",
            Self::Io(_) => "A file operation failed.",
        }
    }
}

pub type Result<T> = std::result::Result<T, MurmurError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_sample_counts() {
        let err = MurmurError::InsufficientAudio { got: 120, need: 400 };
        let msg = err.to_string();
        assert!(msg.contains("120"), "message was: {msg}");
        assert!(msg.contains("400"), "message was: {msg}");
    }

    #[test]
    fn status_messages_are_distinct_per_kind() {
        let errors = [
            MurmurError::Config("x".into()),
            MurmurError::InsufficientAudio { got: 0, need: 1 },
            MurmurError::UnsupportedLayout(vec![2, 3]),
            MurmurError::Decode("x".into()),
            MurmurError::Vocabulary("x".into()),
        ];
        let mut seen = std::collections::HashSet::new();
        for err in &errors {
            assert!(seen.insert(err.status_message()));
        }
    }
}
