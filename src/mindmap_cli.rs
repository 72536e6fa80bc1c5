//! CLI subcommands for mindmap files: `mindnet mindmap validate|format|merge`.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use mindnet_core::mindmap::{self, SerializeOptions};
use mindnet_core::MemoryError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum MindmapCommands {
    /// Check a mindmap file and list every grammar error
    Validate { file: PathBuf },
    /// Re-indent a mindmap file
    Format {
        file: PathBuf,
        /// Spaces per level
        #[arg(long, default_value_t = 2)]
        indent: usize,
        /// Drop ::icon(...) lines
        #[arg(long)]
        no_icons: bool,
    },
    /// Merge INCOMING into EXISTING by node name and print the result
    Merge {
        existing: PathBuf,
        incoming: PathBuf,
        /// Overwrite EXISTING instead of printing
        #[arg(long)]
        in_place: bool,
    },
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read mindmap: {}", path.display()))
}

pub fn handle_command(cmd: MindmapCommands, json: bool) -> Result<()> {
    match cmd {
        MindmapCommands::Validate { file } => {
            let report = mindmap::validate(&read(&file)?);
            if json {
                let errors: Vec<_> = report
                    .errors
                    .iter()
                    .map(|e| serde_json::json!({ "line": e.line, "fragment": e.fragment, "message": e.message }))
                    .collect();
                println!("{}", serde_json::json!({ "valid": report.valid, "errors": errors }));
            } else if report.valid {
                println!("{}: ok", file.display());
            } else {
                for error in &report.errors {
                    println!("{}: {error}", file.display());
                }
            }
            if !report.valid {
                bail!("{} has {} error(s)", file.display(), report.errors.len());
            }
        }

        MindmapCommands::Format {
            file,
            indent,
            no_icons,
        } => {
            let tree = mindmap::parse(&read(&file)?).map_err(MemoryError::Parse)?;
            let options = SerializeOptions {
                indent_size: indent,
                include_icons: !no_icons,
            };
            print!("{}", mindmap::serialize(&tree, &options));
        }

        MindmapCommands::Merge {
            existing,
            incoming,
            in_place,
        } => {
            let base = if existing.exists() {
                read(&existing)?
            } else {
                String::new()
            };
            let merged = mindmap::merge(&base, &read(&incoming)?).map_err(MemoryError::Parse)?;
            if in_place {
                fs::write(&existing, &merged)
                    .with_context(|| format!("Failed to write mindmap: {}", existing.display()))?;
            } else {
                print!("{merged}");
            }
        }
    }
    Ok(())
}
