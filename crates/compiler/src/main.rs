//! `stgc` CLI: compile a source file to a C translation unit, or interpret
//! it directly.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;
use stgc::{CompilerConfig, OptimizationLevel};

#[derive(ClapParser)]
#[command(name = "stgc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "stgc - an STG-machine toy language compiler and interpreter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file to a C translation unit
    Build {
        /// Input source file
        input: PathBuf,

        /// Output .c path (defaults to the input path with a .c extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Downgrade single-use thunks to non-updateable lambda forms (§4.1)
        #[arg(long)]
        optimize: bool,

        /// Path to a stgc.toml to load instead of the defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compile and run a source file through the in-process interpreter
    Run {
        /// Input source file
        input: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, optimize, config } => run_build(&input, output.as_deref(), optimize, config.as_deref()),
        Commands::Run { input } => run_run(&input),
        Commands::Completions { shell } => run_completions(shell),
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "stgc", &mut io::stdout());
}

fn load_config(config_path: Option<&std::path::Path>, optimize: bool) -> CompilerConfig {
    let mut config = match config_path {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(text) => match CompilerConfig::from_toml(&text) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error parsing {}: {}", path.display(), e);
                    process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                process::exit(1);
            }
        },
        None => CompilerConfig::default(),
    };
    if optimize {
        config.optimization_level = OptimizationLevel::O1;
    }
    config
}

fn run_build(input: &std::path::Path, output: Option<&std::path::Path>, optimize: bool, config_path: Option<&std::path::Path>) {
    let config = load_config(config_path, optimize);
    match stgc::compile_file(input, output, &config) {
        Ok(written) => println!("Compiled {} -> {}", input.display(), written.display()),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run_run(input: &std::path::Path) {
    if let Err(e) = stgc::run_file(input) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
