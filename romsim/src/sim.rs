use comfy_table::Table;
use log::{debug, trace};

use crate::isa::*;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterFile {
    regs: [Word; NUM_REGS],
}

impl RegisterFile {
    pub fn read(&self, r: Reg) -> Word {
        self.regs[r]
    }

    pub fn write(&mut self, r: Reg, val: Word) {
        trace!("R{} <- {:04x}", r, val);
        self.regs[r] = val;
    }

    pub fn to_array(&self) -> [Word; NUM_REGS] {
        self.regs
    }
}

/// A full 16-bit address space of words.
#[derive(Clone, PartialEq, Eq)]
pub struct MemoryBank {
    words: Box<[Word]>,
}

impl Default for MemoryBank {
    fn default() -> Self {
        Self {
            words: vec![0; BANK_WORDS].into_boxed_slice(),
        }
    }
}

impl MemoryBank {
    pub fn read(&self, addr: Word) -> Word {
        self.words[addr as usize]
    }

    pub fn write(&mut self, addr: Word, val: Word) {
        self.words[addr as usize] = val;
    }

    /// Copies `words` in from address 0. Anything past the end of the bank is dropped.
    pub fn load(&mut self, words: &[Word]) {
        let n = words.len().min(BANK_WORDS);
        self.words[..n].copy_from_slice(&words[..n]);
    }

    pub fn as_slice(&self) -> &[Word] {
        &self.words
    }
}

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, enum_utils::IterVariants)]
pub enum Bank {
    Instruction,
    Data,
    Stack,
}
impl Bank {
    pub fn all() -> impl Iterator<Item = Bank> {
        Bank::iter()
    }

    pub fn title(&self) -> &'static str {
        match self {
            Bank::Instruction => "Instruction RAM",
            Bank::Data => "Data RAM",
            Bank::Stack => "Stack RAM",
        }
    }
}

#[derive(Clone, Default)]
pub struct Machine {
    regs: RegisterFile,
    instructions: MemoryBank,
    data: MemoryBank,
    stack: MemoryBank,
    pc: Word,
    rsp: Word,
    mar: Word,
    data_updated: bool,
    stack_updated: bool,
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut t = Table::new();
        t.add_row(self.regs.regs[0..8].iter().map(|x| format!("{:04x}", x)));
        t.add_row(self.regs.regs[8..].iter().map(|x| format!("{:04x}", x)));
        t.add_row(
            vec![(self.pc, "pc"), (self.rsp, "rsp"), (self.mar, "mar")]
                .iter()
                .map(|(x, lbl)| format!("{} = {:04x}", lbl, x)),
        );
        write!(f, "{}", t)
    }
}

/// Read-only view of the machine handed to renderers.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub regs: [Word; NUM_REGS],
    pub pc: Word,
    pub rsp: Word,
    pub mar: Word,
    pub data_updated: bool,
    pub stack_updated: bool,
    pub instructions: &'a [Word],
    pub data: &'a [Word],
    pub stack: &'a [Word],
}

impl<'a> Snapshot<'a> {
    pub fn bank(&self, bank: Bank) -> &'a [Word] {
        match bank {
            Bank::Instruction => self.instructions,
            Bank::Data => self.data,
            Bank::Stack => self.stack,
        }
    }

    pub fn current(&self) -> Insn {
        Insn::decode(self.instructions[self.pc as usize])
    }
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a program in the instruction bank. Only meaningful before stepping starts.
    pub fn load(&mut self, words: &[Word]) {
        self.instructions.load(words);
    }

    pub fn pc(&self) -> Word {
        self.pc
    }

    pub fn rsp(&self) -> Word {
        self.rsp
    }

    pub fn mar(&self) -> Word {
        self.mar
    }

    pub fn regs(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn bank(&self, bank: Bank) -> &MemoryBank {
        match bank {
            Bank::Instruction => &self.instructions,
            Bank::Data => &self.data,
            Bank::Stack => &self.stack,
        }
    }

    pub fn exec(&mut self, i: Insn) {
        debug!("{:04x}: exec {}", self.pc, i);

        let mut pc = self.pc.wrapping_add(1);
        match i {
            Insn::Move { src, dst } => {
                self.regs.write(dst, self.regs.read(src));
            }
            Insn::LoadImm { dst } => {
                self.regs.write(dst, self.instructions.read(pc));
                pc = pc.wrapping_add(1);
            }
            Insn::Store { src, addr } => {
                let a = self.regs.read(addr);
                self.data.write(a, self.regs.read(src));
                self.mar = a;
                self.data_updated = true;
            }
            Insn::Load { addr, mark, dst } => {
                let v = self.data.read(self.regs.read(addr));
                self.regs.write(dst, v);
                self.mar = self.regs.read(mark);
                self.data_updated = true;
            }
            Insn::Alu { op, a, b, dst } => {
                self.regs
                    .write(dst, op.apply(self.regs.read(a), self.regs.read(b)));
            }
            Insn::Unary { op, src, dst } => {
                self.regs.write(dst, op.apply(self.regs.read(src)));
            }
            Insn::Push { src, pc: from_pc } => {
                let v = if from_pc { self.pc } else { self.regs.read(src) };
                self.stack.write(self.rsp, v);
                self.rsp = self.rsp.wrapping_add(1);
                self.stack_updated = true;
            }
            Insn::Pop { dst, pc: to_pc } => {
                self.rsp = self.rsp.wrapping_sub(1);
                let v = self.stack.read(self.rsp);
                if to_pc {
                    pc = v.wrapping_add(1);
                } else {
                    self.regs.write(dst, v);
                }
                self.stack_updated = true;
            }
            Insn::Jump { target } => {
                pc = self.regs.read(target);
            }
            Insn::JumpCond { target, test, cond } => {
                if Condition::from_u8(cond).holds(self.regs.read(test)) {
                    pc = self.regs.read(target);
                }
            }
        }

        self.pc = pc;
    }

    /// Fetches, decodes and executes one instruction, returning it.
    pub fn step_one(&mut self) -> Insn {
        let i = Insn::decode(self.instructions.read(self.pc));
        self.exec(i);
        i
    }

    pub fn step(&mut self, n: u64) {
        for _ in 0..n {
            self.step_one();
        }
    }

    /// Takes a view of the machine. The data/stack "updated" marks are reported
    /// here once and then cleared.
    pub fn snapshot(&mut self) -> Snapshot<'_> {
        let data_updated = std::mem::take(&mut self.data_updated);
        let stack_updated = std::mem::take(&mut self.stack_updated);
        Snapshot {
            data_updated,
            stack_updated,
            ..self.peek()
        }
    }

    /// Like [`Machine::snapshot`] but leaves the "updated" marks in place.
    pub fn peek(&self) -> Snapshot<'_> {
        Snapshot {
            regs: self.regs.to_array(),
            pc: self.pc,
            rsp: self.rsp,
            mar: self.mar,
            data_updated: self.data_updated,
            stack_updated: self.stack_updated,
            instructions: self.instructions.as_slice(),
            data: self.data.as_slice(),
            stack: self.stack.as_slice(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn with_regs(vals: &[(Reg, Word)]) -> Machine {
        let mut m = Machine::new();
        for &(r, v) in vals {
            m.regs.write(r, v);
        }
        m
    }

    #[test]
    fn move_to_self_is_noop() {
        for r in 0..NUM_REGS {
            let mut m = with_regs(&[(r, 0xbeef)]);
            m.exec(Insn::Move { src: r, dst: r });
            assert_eq!(m.regs.read(r), 0xbeef);
            assert_eq!(m.pc, 1);
        }
    }

    #[test]
    fn move_there_and_back() {
        let mut m = with_regs(&[(2, 0x1234), (7, 0x9999)]);
        m.exec(Insn::Move { src: 2, dst: 7 });
        m.exec(Insn::Move { src: 7, dst: 2 });
        assert_eq!(m.regs.read(2), 0x1234);
        assert_eq!(m.regs.read(7), 0x1234);
    }

    #[test]
    fn load_immediate_consumes_literal() {
        let mut m = Machine::new();
        m.load(&[0x1004, 0xcafe, 0x1005, 0x0001]);
        m.step(1);
        assert_eq!(m.regs.read(4), 0xcafe);
        assert_eq!(m.pc, 2);
        m.step(1);
        assert_eq!(m.regs.read(5), 1);
        assert_eq!(m.pc, 4);
    }

    #[test]
    fn load_immediate_literal_wraps_to_zero() {
        let mut m = Machine::new();
        m.load(&[0x4242]);
        m.instructions.write(0xffff, 0x1001);
        m.pc = 0xffff;
        m.step(1);
        assert_eq!(m.regs.read(1), 0x4242);
        assert_eq!(m.pc, 1);
    }

    #[test]
    fn add_sub_wrap() {
        let mut m = with_regs(&[(1, 0xffff), (2, 0x0001), (3, 0x0000)]);
        m.load(&[0x8124, 0x9325]);
        m.step(2);
        assert_eq!(m.regs.read(4), 0x0000);
        assert_eq!(m.regs.read(5), 0xffff);
    }

    #[test]
    fn bitwise_and_logic() {
        let mut m = with_regs(&[(1, 0b1100), (2, 0b1010)]);
        // OR, AND, XOR, NOT, LNOT, LNOT of zero, SHR
        m.load(&[0x4123, 0x6124, 0x7125, 0x5106, 0xa107, 0xa008, 0xb109]);
        m.step(7);
        assert_eq!(m.regs.read(3), 0b1110);
        assert_eq!(m.regs.read(4), 0b1000);
        assert_eq!(m.regs.read(5), 0b0110);
        assert_eq!(m.regs.read(6), !0b1100);
        assert_eq!(m.regs.read(7), 0);
        assert_eq!(m.regs.read(8), 1);
        assert_eq!(m.regs.read(9), 0b0110);
        assert_eq!(m.pc, 7);
    }

    #[test]
    fn shift_is_logical() {
        let mut m = with_regs(&[(1, 0x8001)]);
        m.exec(Insn::decode(0xb102));
        assert_eq!(m.regs.read(2), 0x4000);
    }

    #[test]
    fn store_and_load_mark_mar() {
        let mut m = with_regs(&[(1, 0x00aa), (2, 0x0030), (3, 0x0077)]);
        m.exec(Insn::decode(0x2120));
        assert_eq!(m.data.read(0x30), 0x00aa);
        assert_eq!(m.mar, 0x30);
        assert!(m.data_updated);

        // read address comes from rA, MAR from rB
        m.exec(Insn::decode(0x3234));
        assert_eq!(m.regs.read(4), 0x00aa);
        assert_eq!(m.mar, 0x77);
        assert_eq!(m.pc, 2);
    }

    #[test]
    fn push_pop_round_trip() {
        let mut m = with_regs(&[(3, 0x5151)]);
        m.rsp = 0x20;
        m.load(&[0xc300, 0xd009]);
        m.step(1);
        assert_eq!(m.rsp, 0x21);
        assert_eq!(m.stack.read(0x20), 0x5151);
        m.step(1);
        assert_eq!(m.rsp, 0x20);
        assert_eq!(m.regs.read(9), 0x5151);
        assert_eq!(m.pc, 2);
    }

    #[test]
    fn push_pc_flag() {
        let mut m = Machine::new();
        m.load(&[0x0000, 0x0000, 0xc080]);
        m.step(3);
        assert_eq!(m.stack.read(0), 2);
        assert_eq!(m.rsp, 1);
    }

    #[test]
    fn pop_into_pc_resumes_after_saved_address() {
        let mut m = Machine::new();
        m.stack.write(0, 0x0040);
        m.rsp = 1;
        m.exec(Insn::Pop { dst: 0, pc: true });
        assert_eq!(m.pc, 0x41);
        assert_eq!(m.rsp, 0);
    }

    #[test]
    fn stack_wraps() {
        let mut m = with_regs(&[(1, 7)]);
        m.exec(Insn::Pop { dst: 2, pc: false });
        assert_eq!(m.rsp, 0xffff);
        m.exec(Insn::Push { src: 1, pc: false });
        assert_eq!(m.rsp, 0);
        assert_eq!(m.stack.read(0xffff), 7);
    }

    #[test]
    fn jump_is_exact() {
        let mut m = with_regs(&[(5, 0x0123)]);
        m.load(&[0xe500]);
        m.step(1);
        assert_eq!(m.pc, 0x0123);
    }

    #[test]
    fn conditional_jumps() {
        let mut m = with_regs(&[(0xa, 0x0010), (0xb, 0x0000)]);
        m.exec(Insn::decode(0xfab0));
        assert_eq!(m.pc, 0x0010);

        let mut m = with_regs(&[(0xa, 0x0010), (0xb, 0x0001)]);
        m.pc = 5;
        m.exec(Insn::decode(0xfab0));
        assert_eq!(m.pc, 6);

        let mut m = with_regs(&[(0xa, 0x0010), (0xb, 0x0000)]);
        m.pc = 5;
        m.exec(Insn::decode(0xfab1));
        assert_eq!(m.pc, 6);

        let mut m = with_regs(&[(0xa, 0x0010), (0xb, 0x1000)]);
        m.exec(Insn::decode(0xfab2));
        assert_eq!(m.pc, 0x10);

        // only bit 12 counts as the sign
        let mut m = with_regs(&[(0xa, 0x0010), (0xb, 0x8000)]);
        m.exec(Insn::decode(0xfab3));
        assert_eq!(m.pc, 0x10);

        let mut m = with_regs(&[(0xa, 0x0010), (0xb, 0xffff)]);
        m.exec(Insn::decode(0xfabf));
        assert_eq!(m.pc, 1);
    }

    #[test]
    fn updated_marks_are_observed_once() {
        let mut m = with_regs(&[(1, 0x0005)]);
        m.exec(Insn::decode(0x2110));
        m.exec(Insn::decode(0xc100));
        assert!(m.peek().data_updated);
        let s = m.snapshot();
        assert!(s.data_updated && s.stack_updated);
        let s = m.snapshot();
        assert!(!s.data_updated && !s.stack_updated);
        // stepping does not clear them either
        m.exec(Insn::decode(0x2110));
        m.exec(Insn::decode(0x0000));
        assert!(m.snapshot().data_updated);
    }

    #[test]
    fn starts_zeroed() {
        let m = Machine::new();
        let s = m.peek();
        assert_eq!(s.regs, [0; NUM_REGS]);
        assert_eq!((s.pc, s.rsp, s.mar), (0, 0, 0));
        assert!(s.instructions.iter().all(|&w| w == 0));
        assert!(s.data.iter().all(|&w| w == 0));
    }

    proptest! {
        #[test]
        fn not_is_involutive(x in any::<u16>()) {
            let mut m = with_regs(&[(1, x)]);
            m.load(&[0x5102, 0x5203]);
            m.step(2);
            prop_assert_eq!(m.regs.read(2), !x);
            prop_assert_eq!(m.regs.read(3), x);
        }

        #[test]
        fn any_word_executes(w in any::<u16>(), regs in any::<[u16; 16]>()) {
            let mut m = Machine::new();
            for (r, v) in regs.iter().enumerate() {
                m.regs.write(r, *v);
            }
            m.load(&[w]);
            m.step(1);
        }
    }
}
