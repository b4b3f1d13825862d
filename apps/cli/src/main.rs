//! tgformat CLI: convert rich-text HTML into Telegram's `parse_mode=HTML`
//! subset and check messages against Telegram's limits.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
