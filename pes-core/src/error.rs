use thiserror::Error;

/// Errors raised while loading the consoles or games-catalogue files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line that is neither a section header, a key=value pair,
    /// a comment, nor blank.
    #[error("malformed config at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("console '{section}' is missing required option '{option}'")]
    MissingOption { section: String, option: String },

    #[error("console '{section}' option '{option}' is invalid: {reason}")]
    InvalidValue {
        section: String,
        option: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            reason: reason.into(),
        }
    }

    pub fn missing(section: impl Into<String>, option: impl Into<String>) -> Self {
        Self::MissingOption {
            section: section.into(),
            option: option.into(),
        }
    }

    pub fn invalid(
        section: impl Into<String>,
        option: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            section: section.into(),
            option: option.into(),
            reason: reason.into(),
        }
    }
}
