//! EMMI CLI - Command-line front end for the EMMI script compiler
//!
//! Provides subcommands for compiling program descriptions, translating
//! free-text requests, and inspecting wire scripts.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use emmi::compiler::{compile, parse_script, validate_script};
use emmi::config::{TranslatorConfig, load_config};
use emmi::mapper::{BlockMap, MemoryWorkspace, Workspace, map_script_to_blocks};
use emmi::pipeline::Translator;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "emmi")]
#[command(about = "Compile robot programs to the EMMI wire protocol", long_about = None)]
#[command(version = emmi::VERSION)]
struct Cli {
    /// Print full JSON output instead of just the script
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON program description
    Compile {
        /// JSON text, or a path to a JSON file
        input: String,
    },

    /// Translate a free-text request into a script
    Translate {
        /// What the robot should do
        message: String,

        /// Translator configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Skip the reasoning service
        #[arg(long)]
        offline: bool,
    },

    /// Check a wire script
    Validate {
        /// Script text
        script: String,
    },

    /// Read a wire script back into a program description
    Parse {
        /// Script text
        script: String,
    },

    /// Map a script or token stream onto blocks
    Blocks {
        /// Script text or token stream such as `ERN|D200`
        input: String,

        /// Block map JSON file overriding the built-in table
        #[arg(short, long)]
        map: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { input } => {
            let raw = read_description(&input)?;
            let compiled = compile(&raw).context("Compiled script failed validation")?;
            if cli.json {
                let description = compiled
                    .program
                    .to_description()
                    .context("Failed to serialize program")?;
                print_json(&serde_json::json!({
                    "program": description,
                    "script": compiled.script,
                    "warnings": compiled.warnings,
                }))?;
            } else {
                println!("{}", compiled.script);
                print_warnings(&compiled.warnings);
            }
        }

        Commands::Translate {
            message,
            config,
            offline,
        } => {
            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => TranslatorConfig::default(),
            };
            config.offline |= offline;

            let translator = Translator::from_config(&config)?;
            let response = translator.translate(&message);
            if cli.json {
                print_json(&response)?;
            } else {
                println!("{}", response.script);
                eprintln!("{}", response.explanation);
                print_warnings(&response.warnings);
            }
        }

        Commands::Validate { script } => {
            validate_script(&script)?;
            println!("OK");
        }

        Commands::Parse { script } => {
            let program = parse_script(&script)?;
            let description = program
                .to_description()
                .context("Failed to serialize program")?;
            print_json(&description)?;
        }

        Commands::Blocks { input, map } => {
            let map = match map {
                Some(path) => BlockMap::from_json_file(&path)?,
                None => BlockMap::default(),
            };
            let mut workspace = MemoryWorkspace::new();
            let report = map_script_to_blocks(&mut workspace, &input, &map)?;
            if cli.json {
                print_json(&serde_json::json!({
                    "report": report,
                    "blocks": workspace.graph(),
                }))?;
            } else {
                for block in workspace.blocks() {
                    println!("{} {} {:?}", block.id, block.kind, block.fields);
                }
                println!("Instantiated {} blocks", report.instantiated);
                print_warnings(&report.warnings);
            }
        }
    }

    Ok(())
}

// Inline JSON starts with a brace; anything else is a file path.
fn read_description(input: &str) -> Result<serde_json::Value> {
    let text = if input.trim_start().starts_with('{') {
        input.to_string()
    } else {
        let path = Path::new(input);
        if !path.exists() {
            bail!("No such description file: {:?}", path);
        }
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?
    };
    serde_json::from_str(&text).context("Description is not valid JSON")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{text}");
    Ok(())
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
}
