use std::io;
use std::num::IntErrorKind;
use std::path::{Path, PathBuf};

use log::warn;
use thiserror::Error;

use crate::isa::{Word, BANK_WORDS};

/// Recoverable problems found while loading; the program still loads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadWarning {
    #[error("instruction `{token}` at address 0x{addr:04X} over 0xFFFF; defaulting to 0x0000")]
    OutOfRange { addr: Word, token: String },
    #[error("instruction RAM overflow; truncating at {0} instructions")]
    Overflow(usize),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("`{token}` at address 0x{addr:04X} is not a hexadecimal word")]
    Parse { addr: Word, token: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub words: Vec<Word>,
    pub warnings: Vec<LoadWarning>,
}

enum Token {
    Word(Word),
    TooBig,
    Bad,
}

fn parse_token(tok: &str) -> Token {
    let digits = tok
        .strip_prefix("0x")
        .or_else(|| tok.strip_prefix("0X"))
        .unwrap_or(tok);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Token::Bad;
    }
    match Word::from_str_radix(digits, 16) {
        Ok(w) => Token::Word(w),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Token::TooBig,
        Err(_) => Token::Bad,
    }
}

/// Parses whitespace-separated hex words, as laid out in a program file.
pub fn parse(src: &str) -> Result<Program, LoadError> {
    let mut prog = Program::default();
    let mut tokens = src.split_whitespace();
    for tok in tokens.by_ref() {
        let addr = prog.words.len() as Word;
        let w = match parse_token(tok) {
            Token::Word(w) => w,
            Token::TooBig => {
                let w = LoadWarning::OutOfRange {
                    addr,
                    token: tok.to_owned(),
                };
                warn!("{}", w);
                prog.warnings.push(w);
                0
            }
            Token::Bad => {
                return Err(LoadError::Parse {
                    addr,
                    token: tok.to_owned(),
                })
            }
        };
        prog.words.push(w);
        if prog.words.len() >= BANK_WORDS {
            break;
        }
    }
    if tokens.next().is_some() {
        let w = LoadWarning::Overflow(BANK_WORDS);
        warn!("{}", w);
        prog.warnings.push(w);
    }
    Ok(prog)
}

/// Reads a program file. Bytes that are not UTF-8 are kept as replacement
/// characters so they surface as bad tokens in [`parse`].
pub fn read_source(path: &Path) -> Result<String, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_owned(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn load_file(path: &Path) -> Result<Program, LoadError> {
    parse(&read_source(path)?)
}
