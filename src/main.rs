//! `ondevice-cli` entry point.
//!
//! ## CLI Subcommands
//!
//! - `ondevice-cli config show|defaults` - Print configuration
//! - `ondevice-cli catalog validate|list <file>` - Check a model catalog
//! - `ondevice-cli probe <file>` - Sniff a model file's format signature
//! - `ondevice-cli load <catalog> <id>` - Load a model, print status, unload

use std::path::Path;
use std::process::ExitCode;

use ondevice_core::cli::{config_cmd, models_cmd};
use ondevice_core::config;
use ondevice_core::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    let env = config::load();
    if let Err(e) = telemetry::init_logging(&env.log) {
        eprintln!("Logging disabled: {}", e);
    }

    match command {
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("ondevice-cli {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    config_cmd::run_show();
                    ExitCode::SUCCESS
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "catalog" => {
            let (Some(subcommand), Some(file)) = (args.get(2), args.get(3)) else {
                print_command_help("catalog");
                return ExitCode::from(2u8);
            };
            let code = match subcommand.as_str() {
                "validate" => models_cmd::run_validate(Path::new(file)),
                "list" => models_cmd::run_list(Path::new(file)),
                _ => {
                    eprintln!("Unknown catalog subcommand: {}", subcommand);
                    print_command_help("catalog");
                    1
                }
            };
            ExitCode::from(code as u8)
        }
        "probe" => {
            let Some(file) = args.get(2) else {
                print_command_help("probe");
                return ExitCode::from(2u8);
            };
            ExitCode::from(models_cmd::run_probe(Path::new(file)) as u8)
        }
        "load" => {
            let (Some(catalog), Some(id)) = (args.get(2), args.get(3)) else {
                print_command_help("load");
                return ExitCode::from(2u8);
            };
            ExitCode::from(models_cmd::run_load(Path::new(catalog), id).await as u8)
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "ondevice-cli v{}

USAGE:
    ondevice-cli <COMMAND> [ARGS]

COMMANDS:
    config show|defaults          Print effective or default configuration
    catalog validate|list <file>  Check or list a model catalog (TOML/JSON)
    probe <file>                  Report a model file's format signature
    load <catalog> <id>           Load a catalog model, print status, unload
    version                       Print version
    help [command]                Show help

ENVIRONMENT:
    ONDEVICE_DOCUMENTS_DIR, ONDEVICE_ASSET_DIR, ONDEVICE_TEMP_DIR,
    ONDEVICE_THREADS, ONDEVICE_STREAM_BUFFER,
    ONDEVICE_LOG_LEVEL, ONDEVICE_LOG_FORMAT, ONDEVICE_LOG_FILE",
        version
    );
}

fn print_command_help(command: &str) {
    let text = match command {
        "config" => "ondevice-cli config show|defaults\n\nPrints ONDEVICE_* values as KEY=VALUE lines.",
        "catalog" => {
            "ondevice-cli catalog validate|list <file>\n\n\
             Parses a catalog (.json as JSON, anything else as TOML) and checks\n\
             every descriptor and id uniqueness."
        }
        "probe" => {
            "ondevice-cli probe <file>\n\n\
             Reads the first 8 bytes and reports GGUF or TFL3 signatures.\n\
             Exits 1 when the file is too small to be a model."
        }
        "load" => {
            "ondevice-cli load <catalog> <id>\n\n\
             Loads the model through the engine registry using the bindings\n\
             compiled into this build, prints engine status, then unloads."
        }
        _ => {
            print_usage();
            return;
        }
    };
    eprintln!("{}", text);
}
