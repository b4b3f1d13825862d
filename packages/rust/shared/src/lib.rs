//! Shared pieces of tgformat: the error type, the option enums used by both
//! the converter and the CLI, and `~/.tgformat/tgformat.toml` handling.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    AppConfig, ConvertConfig, DEFAULT_CAPTION_LIMIT, DEFAULT_MESSAGE_LIMIT, LimitsConfig,
    config_dir, config_file_path, init_config, init_config_at, load_config, load_config_from,
    validate_limits,
};
pub use error::{Result, TgFormatError};
pub use types::{MessageKind, OrderedListStyle, ParagraphBreak};
