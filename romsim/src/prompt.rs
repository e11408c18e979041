use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, info};
use thiserror::Error;

use crate::loader;
use crate::render::Renderer;
use crate::sim::Machine;

pub const MENU: &str =
    "Type a number to step that many times, (v) to view the CPU's state, or (q) to quit.\n>> ";

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    View,
    Quit,
    Step(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Invalid step number. Please try again.")]
    InvalidStep(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(tok: &str) -> Result<Command, CommandError> {
        let tok = tok.trim().to_ascii_lowercase();
        if tok.contains('v') {
            Ok(Command::View)
        } else if tok.contains('q') {
            Ok(Command::Quit)
        } else if !tok.is_empty() && tok.bytes().all(|b| b.is_ascii_digit()) {
            tok.parse()
                .map(Command::Step)
                .map_err(|_| CommandError::InvalidStep(tok))
        } else {
            Err(CommandError::InvalidStep(tok))
        }
    }
}

/// Drives a machine from line-oriented user input.
pub struct Session<R, W> {
    machine: Machine,
    renderer: Renderer,
    input: R,
    output: W,
    trace: bool,
}

impl<R: BufRead, W: Write> Session<R, W> {
    pub fn new(machine: Machine, renderer: Renderer, input: R, output: W) -> Self {
        Self {
            machine,
            renderer,
            input,
            output,
            trace: false,
        }
    }

    /// Show the state after every instruction rather than once per command.
    pub fn trace(mut self, on: bool) -> Self {
        self.trace = on;
        self
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn into_parts(self) -> (Machine, W) {
        (self.machine, self.output)
    }

    fn show(&mut self) -> io::Result<()> {
        let text = self
            .renderer
            .render(&self.machine.snapshot())
            .map_err(io::Error::from)?;
        writeln!(self.output, "{}", text)
    }

    fn step(&mut self, n: u64) -> io::Result<()> {
        debug!("stepping {} instructions", n);
        if self.trace {
            for _ in 0..n {
                self.machine.step(1);
                self.show()?;
            }
        } else if n > 0 {
            self.machine.step(n);
            self.show()?;
        }
        Ok(())
    }

    /// Runs until the user quits or input ends.
    pub fn run(&mut self) -> io::Result<()> {
        let mut line = String::new();
        loop {
            write!(self.output, "{}", MENU)?;
            self.output.flush()?;
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                info!("end of input");
                return Ok(());
            }
            for tok in line.split_whitespace() {
                match tok.parse::<Command>() {
                    Ok(Command::View) => self.show()?,
                    Ok(Command::Quit) => {
                        writeln!(self.output, "Exiting...")?;
                        return Ok(());
                    }
                    Ok(Command::Step(n)) => self.step(n)?,
                    Err(e) => {
                        writeln!(self.output, "{}", e)?;
                        break;
                    }
                }
            }
        }
    }
}

/// Reads the program source named on the command line, falling back to
/// asking for a filename until one can be read.
pub fn open_program(
    path: Option<&Path>,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> io::Result<(PathBuf, String)> {
    if let Some(p) = path {
        match loader::read_source(p) {
            Ok(src) => return Ok((p.to_owned(), src)),
            Err(e) => {
                debug!("{}", e);
                writeln!(output, "Invalid filename. Please enter valid filename.")?;
            }
        }
    }
    let mut line = String::new();
    loop {
        write!(output, "Enter input filename: \n>> ")?;
        output.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "no program file given",
            ));
        }
        let name = line.trim();
        if name.is_empty() {
            continue;
        }
        let p = PathBuf::from(name);
        match loader::read_source(&p) {
            Ok(src) => return Ok((p, src)),
            Err(e) => {
                debug!("{}", e);
                writeln!(output, "Invalid filename; please try again.")?;
            }
        }
    }
}
