//! CLI command definitions, routing, and tracing setup.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Result;
use tgformat_converter::limits::{fits, split, truncate, visible_len};
use tgformat_converter::scan::{Token, scan};
use tgformat_converter::{CanonicalTag, ConvertOptions, convert, is_well_formed};
use tgformat_shared::{
    AppConfig, ConvertConfig, MessageKind, OrderedListStyle, ParagraphBreak, TgFormatError,
    init_config, init_config_at, load_config, load_config_from,
};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// tgformat: turn editor HTML into Telegram-ready HTML.
#[derive(Parser)]
#[command(
    name = "tgformat",
    version,
    about = "Convert rich-text HTML into the HTML subset accepted by Telegram's parse_mode=HTML.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.tgformat/tgformat.toml.
    #[arg(long, global = true, env = "TGFORMAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Which Telegram limit `--fit` and `--split` apply.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum FitTarget {
    Text,
    Caption,
}

impl From<FitTarget> for MessageKind {
    fn from(target: FitTarget) -> Self {
        match target {
            FitTarget::Text => MessageKind::Text,
            FitTarget::Caption => MessageKind::Caption,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Convert HTML to Telegram HTML and print it to stdout.
    Convert(ConvertArgs),

    /// Check tag balance and visible length against Telegram's limits.
    Check {
        /// Input file; stdin when absent or `-`.
        input: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments of `tgformat convert`. Flags override the config file.
#[derive(Args, Debug, Default)]
pub(crate) struct ConvertArgs {
    /// Input file; stdin when absent or `-`.
    pub input: Option<PathBuf>,

    /// Line breaks after a paragraph: single or double.
    #[arg(long, value_name = "STYLE")]
    pub paragraph_break: Option<ParagraphBreak>,

    /// Number the items of ordered lists instead of bulleting them.
    #[arg(long)]
    pub numbered_lists: bool,

    /// Drop source indentation between blocks and collapse blank lines.
    #[arg(long)]
    pub tidy: bool,

    /// Turn **bold**, *italic*, __underline__, ~~strike~~ and `code` into tags.
    #[arg(long)]
    pub markdown: bool,

    /// Truncate the output to the configured text or caption limit.
    #[arg(long, value_name = "KIND")]
    pub fit: Option<FitTarget>,

    /// Split the output into messages that each fit the limit, printed as a
    /// JSON array of strings.
    #[arg(long, value_name = "KIND", conflicts_with = "fit")]
    pub split: Option<FitTarget>,

    /// Write conversion diagnostics as JSON to stderr.
    #[arg(long)]
    pub report: bool,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout only
/// carries converted HTML.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "tgformat=info",
        1 => "tgformat=debug",
        _ => "tgformat=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Convert(args) => cmd_convert(config_path.as_deref(), &args),
        Command::Check { input } => cmd_check(config_path.as_deref(), input.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path.as_deref()),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Config file values with command-line flags applied on top.
fn resolve_options(config: &ConvertConfig, args: &ConvertArgs) -> ConvertOptions {
    let mut opts = ConvertOptions::from(config);
    if let Some(paragraph_break) = args.paragraph_break {
        opts.paragraph_break = paragraph_break;
    }
    if args.numbered_lists {
        opts.ordered_lists = OrderedListStyle::Numbered;
    }
    if args.tidy {
        opts.tidy_whitespace = true;
    }
    if args.markdown {
        opts.markdown_emphasis = true;
    }
    opts
}

/// Read the whole input, from stdin when `input` is absent or `-`.
fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => {
            let content =
                std::fs::read_to_string(path).map_err(|e| TgFormatError::io(path, e))?;
            Ok(content)
        }
        _ => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .map_err(|e| TgFormatError::io("<stdin>", e))?;
            Ok(content)
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_convert(config_path: Option<&Path>, args: &ConvertArgs) -> Result<()> {
    let config = resolve_config(config_path)?;
    let html = read_input(args.input.as_deref())?;
    write_conversion(
        &html,
        &config,
        args,
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
    )
}

/// Convert `html` and write the result to `out`, and the `--report` JSON to
/// `report_out`.
fn write_conversion(
    html: &str,
    config: &AppConfig,
    args: &ConvertArgs,
    out: &mut impl Write,
    report_out: &mut impl Write,
) -> Result<()> {
    let opts = resolve_options(&config.convert, args);
    let conversion = convert(html, &opts);
    let mut output = conversion.html;
    let mut truncated = false;

    if let Some(target) = args.fit {
        let kind = MessageKind::from(target);
        let limit = config.limits.for_kind(kind);
        if !fits(&output, limit) {
            output = truncate(&output, limit);
            truncated = true;
            warn!(%kind, limit, "output truncated to fit");
        }
    }

    if !conversion.diagnostics.is_clean() {
        info!(
            stray_closers = conversion.diagnostics.repair.stray_closers,
            closed_early = conversion.diagnostics.repair.closed_early,
            closed_at_end = conversion.diagnostics.repair.closed_at_end,
            "input markup was repaired"
        );
    }

    let mut parts = 1;
    match args.split {
        Some(target) => {
            let kind = MessageKind::from(target);
            let messages = split(&output, config.limits.for_kind(kind));
            parts = messages.len();
            if parts > 1 {
                info!(%kind, parts, "output split into several messages");
            }
            writeln!(out, "{}", serde_json::to_string_pretty(&messages)?)?;
        }
        None => write!(out, "{output}")?,
    }

    if args.report {
        let report = serde_json::json!({
            "options": opts,
            "diagnostics": conversion.diagnostics,
            "truncated": truncated,
            "parts": parts,
            "final_visible_len": visible_len(&output),
        });
        writeln!(report_out, "{}", serde_json::to_string_pretty(&report)?)?;
    }

    Ok(())
}

fn cmd_check(config_path: Option<&Path>, input: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let html = read_input(input)?;
    write_check(&html, &config, &mut std::io::stdout().lock())
}

/// Report tag balance, unsupported tags and visible length against both
/// limits. Fails when the tags are not balanced.
fn write_check(html: &str, config: &AppConfig, out: &mut impl Write) -> Result<()> {
    let well_formed = is_well_formed(html);
    let unsupported = unsupported_tags(html);
    let len = visible_len(html);

    writeln!(out, "well-formed:    {}", if well_formed { "yes" } else { "no" })?;
    if !unsupported.is_empty() {
        writeln!(out, "unsupported:    {}", unsupported.join(", "))?;
    }
    writeln!(out, "visible length: {len}")?;
    for kind in [MessageKind::Text, MessageKind::Caption] {
        let limit = config.limits.for_kind(kind);
        let verdict = if len <= limit {
            "ok".to_string()
        } else {
            format!("over by {}", len - limit)
        };
        writeln!(out, "  {kind} limit {limit}: {verdict}")?;
    }

    if !well_formed {
        return Err(TgFormatError::check("tags are not balanced").into());
    }
    Ok(())
}

/// Distinct tag names Telegram would reject, in order of appearance.
fn unsupported_tags(html: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for token in scan(html) {
        if let Token::Tag(tag) = token {
            if CanonicalTag::from_name(&tag.name).is_none() && !names.contains(&tag.name) {
                names.push(tag.name);
            }
        }
    }
    names
}

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => {
            init_config_at(path)?;
            path.to_path_buf()
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
