//! Application configuration for tgformat.
//!
//! User config lives at `~/.tgformat/tgformat.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TgFormatError};
use crate::types::{MessageKind, OrderedListStyle, ParagraphBreak};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "tgformat.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".tgformat";

/// Telegram's limit for `sendMessage` text, after entity parsing.
pub const DEFAULT_MESSAGE_LIMIT: usize = 4096;

/// Telegram's limit for media captions, after entity parsing.
pub const DEFAULT_CAPTION_LIMIT: usize = 1024;

// ---------------------------------------------------------------------------
// Config structs (matching tgformat.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Conversion behaviour.
    #[serde(default)]
    pub convert: ConvertConfig,

    /// Telegram length limits.
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// `[convert]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Line breaks after a closing `</p>`: "single" or "double".
    #[serde(default)]
    pub paragraph_break: ParagraphBreak,

    /// Marker for ordered list items: "bullet" or "numbered".
    #[serde(default)]
    pub ordered_lists: OrderedListStyle,

    /// Drop indentation between block tags and cap blank lines at one.
    #[serde(default)]
    pub tidy_whitespace: bool,

    /// Turn `**bold**`, `*italic*`, `__underline__`, `~~strike~~` and
    /// `` `code` `` in text into tags.
    #[serde(default)]
    pub markdown_emphasis: bool,
}

/// `[limits]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum visible length of message text.
    #[serde(default = "default_message_limit")]
    pub message: usize,

    /// Maximum visible length of a media caption.
    #[serde(default = "default_caption_limit")]
    pub caption: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            message: default_message_limit(),
            caption: default_caption_limit(),
        }
    }
}

impl LimitsConfig {
    /// The limit that applies to the given message kind.
    pub fn for_kind(&self, kind: MessageKind) -> usize {
        match kind {
            MessageKind::Text => self.message,
            MessageKind::Caption => self.caption,
        }
    }
}

fn default_message_limit() -> usize {
    DEFAULT_MESSAGE_LIMIT
}
fn default_caption_limit() -> usize {
    DEFAULT_CAPTION_LIMIT
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Written by [`init_config`]; every value is the built-in default.
const CONFIG_TEMPLATE: &str = r#"# tgformat configuration

[convert]
# Line breaks after a paragraph: "single" or "double".
paragraph_break = "single"
# Marker for ordered list items: "bullet" or "numbered".
ordered_lists = "bullet"
# Drop source indentation between blocks and cap blank lines at one.
tidy_whitespace = false
# Turn **bold**, *italic*, __underline__, ~~strike~~ and `code` into tags.
markdown_emphasis = false

[limits]
# Telegram counts visible text in UTF-16 code units.
message = 4096
caption = 1024
"#;

/// `~/.tgformat/`.
pub fn config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .ok_or_else(|| TgFormatError::config("could not determine home directory"))
}

/// `~/.tgformat/tgformat.toml`.
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load `~/.tgformat/tgformat.toml`, or the defaults when it does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;
    if path.is_file() {
        load_config_from(&path)
    } else {
        tracing::debug!(?path, "no config file, using defaults");
        Ok(AppConfig::default())
    }
}

/// Load and validate a config file. Missing sections and keys take their
/// defaults; unknown enum values are an error.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TgFormatError::io(path, e))?;
    let config: AppConfig =
        toml::from_str(&content).map_err(|source| TgFormatError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

    validate_limits(&config.limits)?;
    tracing::debug!(?path, ?config, "loaded config file");
    Ok(config)
}

/// Write the commented default config to `~/.tgformat/tgformat.toml`.
///
/// An existing file is left untouched. Returns the file's path either way.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    init_config_at(&path)?;
    Ok(path)
}

/// Write the commented default config to `path`, creating its parent
/// directory. An existing file is left untouched.
pub fn init_config_at(path: &Path) -> Result<()> {
    if path.exists() {
        tracing::info!(?path, "config file already exists, not overwriting");
        return Ok(());
    }

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| TgFormatError::io(dir, e))?;
    }
    std::fs::write(path, CONFIG_TEMPLATE).map_err(|e| TgFormatError::io(path, e))?;
    tracing::info!(?path, "wrote default config file");
    Ok(())
}

/// Reject limits that leave no room for the `...` truncation marker.
pub fn validate_limits(limits: &LimitsConfig) -> Result<()> {
    for (name, value) in [("message", limits.message), ("caption", limits.caption)] {
        if value < 4 {
            return Err(TgFormatError::config(format!(
                "limits.{name} = {value} is too small (minimum 4)"
            )));
        }
    }
    Ok(())
}
