use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{debug, error};

use romsim::loader;
use romsim::prompt::{self, Session};
use romsim::render::{Renderer, Style};
use romsim::Machine;

#[derive(Parser, Debug)]
#[command(
    name = "romsim",
    version,
    about = "Step through a 16-bit instruction RAM program",
    long_about = "Loads whitespace-separated hex words into instruction RAM and steps them on demand.\n\nAt the prompt: a number steps that many instructions, (v) views the CPU state, (q) quits."
)]
struct Cli {
    /// Program file of hex words. Prompts for one if missing or unreadable.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Show the state after every instruction instead of once per command.
    #[arg(long)]
    trace: bool,

    /// Emit each view as a JSON object.
    #[arg(long, conflicts_with = "no_color")]
    json: bool,

    /// Mark cells with sigils instead of colours.
    #[arg(long)]
    no_color: bool,
}

impl Cli {
    fn style(&self) -> Style {
        if self.json {
            Style::Json
        } else if self.no_color || !io::stdout().is_terminal() {
            Style::Plain
        } else {
            Style::Color
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();

    let (path, src) = prompt::open_program(cli.file.as_deref(), &mut stdin, &mut stdout)?;
    let program = loader::parse(&src)?;
    debug!(
        "loaded {} words from {} ({} warnings)",
        program.words.len(),
        path.display(),
        program.warnings.len()
    );

    let mut machine = Machine::new();
    machine.load(&program.words);
    debug!("{:?}", machine);

    Session::new(machine, Renderer::new(cli.style()), stdin, stdout)
        .trace(cli.trace)
        .run()?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
