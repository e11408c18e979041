use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use romsim::{disassemble, loader};

/// List a program file one word per line, decoded.
#[derive(Parser, Debug)]
#[command(name = "romdis", version)]
struct Cli {
    /// Program file of hex words.
    file: PathBuf,
}

pub fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));
    let cli = Cli::parse();

    let program = match loader::load_file(&cli.file) {
        Ok(p) => p,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    for line in disassemble(&program.words) {
        println!("{:04X}  {:04X}  {}", line.addr, line.word, line.text);
    }
    ExitCode::SUCCESS
}
