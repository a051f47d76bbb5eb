//! dmkit CLI entry point.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use dmkit_foundation::{LoadConfig, MapConfig};
use dmkit_map::MapFormat;
use dmkit_runtime::{convert_map, load_environment, save_text};
use tracing_subscriber::EnvFilter;

/// What to do.
#[derive(Debug, Default, PartialEq, Eq)]
enum Command {
    /// Load an environment and report its size.
    Check { dme: PathBuf },
    /// Re-serialize a map.
    Convert {
        dme: PathBuf,
        map: PathBuf,
        format: Option<MapFormat>,
        output: Option<PathBuf>,
    },
    #[default]
    None,
}

/// CLI configuration parsed from arguments.
#[derive(Debug, Default)]
struct CliConfig {
    command: Command,
    show_help: bool,
    show_version: bool,
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError: {e}\x1b[0m");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dmkit=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_args(args: Vec<String>) -> Result<CliConfig, Box<dyn std::error::Error>> {
    let mut config = CliConfig::default();
    let mut positional: Vec<String> = Vec::new();
    let mut format = None;
    let mut output = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => config.show_help = true,
            "-V" | "--version" => config.show_version = true,
            "-f" | "--format" => {
                i += 1;
                let Some(name) = args.get(i) else {
                    return Err("--format requires a value".into());
                };
                format = Some(name.parse::<MapFormat>()?);
            }
            "-o" | "--output" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    return Err("-o requires a path".into());
                };
                output = Some(PathBuf::from(path));
            }
            arg if arg.starts_with('-') && arg.len() > 1 => {
                return Err(format!("unknown option: {arg}").into());
            }
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    if config.show_help || config.show_version {
        return Ok(config);
    }

    let mut positional = positional.into_iter();
    config.command = match positional.next().as_deref() {
        Some("check") => {
            let dme = positional.next().ok_or("check requires an environment file")?;
            Command::Check {
                dme: PathBuf::from(dme),
            }
        }
        Some("convert") => {
            let dme = positional.next().ok_or("convert requires an environment file")?;
            let map = positional.next().ok_or("convert requires a map file")?;
            Command::Convert {
                dme: PathBuf::from(dme),
                map: PathBuf::from(map),
                format,
                output,
            }
        }
        Some(other) => return Err(format!("unknown command: {other}").into()),
        None => {
            config.show_help = true;
            Command::None
        }
    };
    if let Some(extra) = positional.next() {
        return Err(format!("unexpected argument: {extra}").into());
    }

    Ok(config)
}

fn run(args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = parse_args(args)?;

    if config.show_help {
        print_help();
        return Ok(());
    }

    if config.show_version {
        println!("dmkit {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    init_logging();

    match config.command {
        Command::Check { dme } => {
            let env = load_environment(&dme, &LoadConfig::default())?;
            println!("{} types", env.type_count());
        }
        Command::Convert {
            dme,
            map,
            format,
            output,
        } => {
            let env = load_environment(&dme, &LoadConfig::default())?;
            let text = convert_map(&env, &map, format, &MapConfig::default())?;
            save_text(output.as_ref().unwrap_or(&map), &text)?;
        }
        Command::None => print_help(),
    }
    Ok(())
}

fn print_help() {
    println!(
        "\x1b[1mdmkit\x1b[0m - DM project loader and map converter

\x1b[1mUSAGE:\x1b[0m
    dmkit check <ENVIRONMENT.dme>
    dmkit convert <ENVIRONMENT.dme> <MAP.dmm> [--format FORMAT] [-o OUT]

\x1b[1mCOMMANDS:\x1b[0m
    check      Load the environment and print the number of types
    convert    Re-serialize a map, in place unless -o is given

\x1b[1mOPTIONS:\x1b[0m
    -h, --help            Print help information
    -V, --version         Print version information
    -f, --format FORMAT   standard, tgm or maphash (default: the map's own)
    -o, --output PATH     Write the converted map here

\x1b[1mENVIRONMENT:\x1b[0m
    RUST_LOG              Log filter (default: dmkit=info)"
    );
}
