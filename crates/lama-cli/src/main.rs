//! `lamai`: run or disassemble a compiled Lama module.
//!
//! ```text
//! lamai prog.bc
//! lamai --trace prog.bc
//! lamai --dump prog.bc
//! ```

mod commands;

use std::path::PathBuf;
use std::process;

use clap::Parser;
use lama_vm::vm::{DEFAULT_ENTRY, DEFAULT_STACK_CAPACITY};
use lama_vm::VmConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "lamai")]
#[command(about = "Lama bytecode interpreter", long_about = None)]
struct Cli {
    /// Compiled bytecode file
    file: PathBuf,

    /// Print every executed instruction to stderr
    #[arg(long)]
    trace: bool,

    /// Disassemble the module instead of running it
    #[arg(long)]
    dump: bool,

    /// Operand stack size in words
    #[arg(long, value_name = "WORDS", default_value_t = DEFAULT_STACK_CAPACITY)]
    stack_size: usize,

    /// Public symbol to start execution at
    #[arg(long, value_name = "NAME", default_value = DEFAULT_ENTRY)]
    entry: String,
}

impl Cli {
    fn config(&self) -> VmConfig {
        VmConfig {
            stack_capacity: self.stack_size,
            entry: self.entry.clone(),
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = if cli.dump {
        commands::dump::run(&cli.file, &mut std::io::stdout().lock())
    } else {
        commands::run::run(&cli.file, cli.config(), cli.trace)
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
