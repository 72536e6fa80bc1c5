//! `mindnet config schema|show`.

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the JSON Schema of config.toml
    Schema,
    /// Print the effective configuration as TOML
    Show,
}

pub fn handle_command(cmd: ConfigCommands, config: &Config) -> Result<()> {
    match cmd {
        ConfigCommands::Schema => println!("{}", Config::json_schema()?),
        ConfigCommands::Show => print!("{}", config.to_toml()?),
    }
    Ok(())
}
