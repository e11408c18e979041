use comfy_table::{Cell, Color, Table};
use itertools::Itertools;
use serde::Serialize;

use crate::isa::*;
use crate::sim::{Bank, Snapshot};

/// Why a memory cell stands out in a window.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    /// The instruction at pc.
    Current,
    /// The literal consumed by a load-immediate at pc.
    Literal,
    /// The instruction that follows the current one.
    Next,
    /// The cell the last memory instruction touched.
    Written,
}

impl Mark {
    fn paint(self, cell: Cell) -> Cell {
        match self {
            Mark::Current => cell.fg(Color::Black).bg(Color::Cyan),
            Mark::Literal => cell.fg(Color::Blue),
            Mark::Next => cell.fg(Color::Magenta),
            Mark::Written => cell.fg(Color::Black).bg(Color::White),
        }
    }

    fn sigil(self) -> char {
        match self {
            Mark::Current => '>',
            Mark::Literal => '#',
            Mark::Next => '+',
            Mark::Written => '*',
        }
    }
}

pub fn mark(snap: &Snapshot<'_>, bank: Bank, addr: usize) -> Option<Mark> {
    match bank {
        Bank::Instruction => {
            let pc = snap.pc as usize;
            let literal = Opcode::of(snap.instructions[pc]) == Opcode::LoadImm;
            if addr == pc {
                Some(Mark::Current)
            } else if addr == pc + 1 {
                Some(if literal { Mark::Literal } else { Mark::Next })
            } else if addr == pc + 2 && literal {
                Some(Mark::Next)
            } else {
                None
            }
        }
        Bank::Data if snap.data_updated && addr == snap.mar as usize => Some(Mark::Written),
        Bank::Stack if snap.stack_updated && addr == snap.rsp as usize => Some(Mark::Written),
        _ => None,
    }
}

/// Base addresses of the rows shown around `pc`: the one before, the one
/// holding it and the one after, where those exist.
pub fn window_bases(pc: Word) -> Vec<Word> {
    let mut bases = Vec::with_capacity(3);
    if pc >= 0x10 {
        bases.push((pc - 16) & 0xfff0);
    }
    bases.push(pc & 0xfff0);
    if pc < 0xfff0 {
        bases.push((pc + 16) & 0xfff0);
    }
    bases
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Row<'a> {
    pub base: Word,
    pub words: &'a [Word],
}

/// Every bank's window is centred on pc, stack included.
pub fn window<'a>(snap: &Snapshot<'a>, bank: Bank) -> Vec<Row<'a>> {
    let words = snap.bank(bank);
    window_bases(snap.pc)
        .into_iter()
        .map(|base| Row {
            base,
            words: &words[base as usize..base as usize + ROW_WORDS],
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct View<'a> {
    pub regs: [Word; NUM_REGS],
    pub pc: Word,
    pub rsp: Word,
    pub mar: Word,
    pub insn: String,
    pub data_updated: bool,
    pub stack_updated: bool,
    pub instructions: Vec<Row<'a>>,
    pub data: Vec<Row<'a>>,
    pub stack: Vec<Row<'a>>,
}

impl<'a> View<'a> {
    pub fn of(snap: &Snapshot<'a>) -> Self {
        View {
            regs: snap.regs,
            pc: snap.pc,
            rsp: snap.rsp,
            mar: snap.mar,
            insn: snap.current().to_asm(),
            data_updated: snap.data_updated,
            stack_updated: snap.stack_updated,
            instructions: window(snap, Bank::Instruction),
            data: window(snap, Bank::Data),
            stack: window(snap, Bank::Stack),
        }
    }
}

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Terminal colours for marked cells.
    Color,
    /// Marked cells get a leading sigil instead of colour.
    Plain,
    /// One JSON object per view.
    Json,
}

#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    style: Style,
}

impl Renderer {
    pub fn new(style: Style) -> Self {
        Self { style }
    }

    fn table(&self) -> Table {
        let mut t = Table::new();
        match self.style {
            Style::Color => t.enforce_styling(),
            _ => t.force_no_tty(),
        };
        t
    }

    pub fn registers(&self, snap: &Snapshot<'_>) -> Table {
        let mut t = self.table();
        for (row, regs) in snap.regs.chunks(4).enumerate() {
            t.add_row(
                regs.iter()
                    .enumerate()
                    .map(|(i, v)| format!("r{}: 0x{:04X}", 4 * row + i, v))
                    .collect_vec(),
            );
        }
        t.add_row(vec![
            format!("pc: 0x{:04X}", snap.pc),
            format!("rsp: 0x{:04X}", snap.rsp),
            format!("mar: 0x{:04X}", snap.mar),
            snap.current().to_asm(),
        ]);
        t
    }

    pub fn memory(&self, snap: &Snapshot<'_>, bank: Bank) -> Table {
        let mut t = self.table();
        t.set_header(
            std::iter::once(String::new())
                .chain((0..ROW_WORDS).map(|i| format!("0x{:X}", i)))
                .collect_vec(),
        );
        for row in window(snap, bank) {
            let mut cells = vec![Cell::new(format!("0x{:04X}", row.base))];
            for (i, w) in row.words.iter().enumerate() {
                let text = format!("{:04X}", w);
                let cell = match (mark(snap, bank, row.base as usize + i), self.style) {
                    (None, _) => Cell::new(text),
                    (Some(m), Style::Color) => m.paint(Cell::new(text)),
                    (Some(m), _) => Cell::new(format!("{}{}", m.sigil(), text)),
                };
                cells.push(cell);
            }
            t.add_row(cells);
        }
        t
    }

    pub fn render(&self, snap: &Snapshot<'_>) -> serde_json::Result<String> {
        if let Style::Json = self.style {
            return serde_json::to_string(&View::of(snap));
        }
        let banks = Bank::all()
            .map(|b| format!("{}:\n{}", b.title(), self.memory(snap, b)))
            .join("\n\n");
        Ok(format!("{}\n\n{}\n", self.registers(snap), banks))
    }
}
