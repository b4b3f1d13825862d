//! Error types for tgformat.
//!
//! Converting never fails: bad markup is repaired, not reported. Errors come
//! only from the edges (config files, input files, `tgformat check`), so the
//! library crates return [`TgFormatError`] and the CLI reports it through
//! `color-eyre`.

use std::path::PathBuf;

/// Everything that can go wrong outside the conversion itself.
#[derive(Debug, thiserror::Error)]
pub enum TgFormatError {
    /// A config value was read but is not usable.
    #[error("invalid config: {message}")]
    Config { message: String },

    /// The config file is not valid TOML for [`crate::AppConfig`].
    #[error("cannot parse config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Reading an input or config file, or writing the config file, failed.
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Markup rejected by `tgformat check`.
    #[error("check failed: {message}")]
    Check { message: String },
}

pub type Result<T> = std::result::Result<T, TgFormatError>;

impl TgFormatError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn check(message: impl Into<String>) -> Self {
        Self::Check {
            message: message.into(),
        }
    }

    /// Attach the offending path to an I/O failure.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
