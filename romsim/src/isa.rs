pub type Reg = usize;
pub type Word = u16;

pub const NUM_REGS: usize = 16;
pub const BANK_WORDS: usize = 0x10000;
pub const ROW_WORDS: usize = 16;

/// Bit tested by the "negative" and "positive" jump conditions.
pub const SIGN_BIT: Word = 0x1000;

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, enum_utils::IterVariants)]
pub enum Opcode {
    Move,
    LoadImm,
    Store,
    Load,
    Or,
    Not,
    And,
    Xor,
    Add,
    Sub,
    LogicNot,
    Shr,
    Push,
    Pop,
    Jump,
    JumpCond,
}
impl Opcode {
    pub fn all() -> impl Iterator<Item = Opcode> {
        Opcode::iter()
    }

    pub fn of(val: Word) -> Opcode {
        use Opcode::*;
        match (val & 0xf000) >> 12 {
            0x0 => Move,
            0x1 => LoadImm,
            0x2 => Store,
            0x3 => Load,
            0x4 => Or,
            0x5 => Not,
            0x6 => And,
            0x7 => Xor,
            0x8 => Add,
            0x9 => Sub,
            0xa => LogicNot,
            0xb => Shr,
            0xc => Push,
            0xd => Pop,
            0xe => Jump,
            _ => JumpCond,
        }
    }

    pub fn bits(self) -> Word {
        (self as Word) << 12
    }
}

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Or,
    And,
    Xor,
    Add,
    Sub,
}
impl AluOp {
    pub fn apply(self, a: Word, b: Word) -> Word {
        match self {
            AluOp::Or => a | b,
            AluOp::And => a & b,
            AluOp::Xor => a ^ b,
            AluOp::Add => a.wrapping_add(b),
            AluOp::Sub => a.wrapping_sub(b),
        }
    }

    fn opcode(self) -> Opcode {
        match self {
            AluOp::Or => Opcode::Or,
            AluOp::And => Opcode::And,
            AluOp::Xor => Opcode::Xor,
            AluOp::Add => Opcode::Add,
            AluOp::Sub => Opcode::Sub,
        }
    }

    pub fn brief(&self) -> &'static str {
        use AluOp::*;
        match self {
            Or => "OR",
            And => "AND",
            Xor => "XOR",
            Add => "ADD",
            Sub => "SUB",
        }
    }
}

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    LogicNot,
    Shr,
}
impl UnaryOp {
    pub fn apply(self, a: Word) -> Word {
        match self {
            UnaryOp::Not => !a,
            UnaryOp::LogicNot => (a == 0) as Word,
            UnaryOp::Shr => a >> 1,
        }
    }

    fn opcode(self) -> Opcode {
        match self {
            UnaryOp::Not => Opcode::Not,
            UnaryOp::LogicNot => Opcode::LogicNot,
            UnaryOp::Shr => Opcode::Shr,
        }
    }

    pub fn brief(&self) -> &'static str {
        match self {
            UnaryOp::Not => "NOT",
            UnaryOp::LogicNot => "LNOT",
            UnaryOp::Shr => "SHR",
        }
    }
}

/// Branch condition selected by the low nibble of a conditional jump.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Zero,
    NonZero,
    Negative,
    Positive,
    Never,
}
impl Condition {
    pub fn from_u8(val: u8) -> Condition {
        match val {
            0 => Condition::Zero,
            1 => Condition::NonZero,
            2 => Condition::Negative,
            3 => Condition::Positive,
            _ => Condition::Never,
        }
    }

    pub fn holds(self, v: Word) -> bool {
        match self {
            Condition::Zero => v == 0,
            Condition::NonZero => v != 0,
            Condition::Negative => v & SIGN_BIT != 0,
            Condition::Positive => v != 0 && v & SIGN_BIT == 0,
            Condition::Never => false,
        }
    }

    pub fn brief(&self) -> &'static str {
        match self {
            Condition::Zero => "JZ",
            Condition::NonZero => "JNZ",
            Condition::Negative => "JN",
            Condition::Positive => "JP",
            Condition::Never => "JNV",
        }
    }
}

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub enum Insn {
    Move {
        src: Reg,
        dst: Reg,
    },
    /// The literal lives in the word after the instruction.
    LoadImm {
        dst: Reg,
    },
    Store {
        src: Reg,
        addr: Reg,
    },
    /// `mark` names the register copied into MAR; it is not the read address.
    Load {
        addr: Reg,
        mark: Reg,
        dst: Reg,
    },
    Alu {
        op: AluOp,
        a: Reg,
        b: Reg,
        dst: Reg,
    },
    Unary {
        op: UnaryOp,
        src: Reg,
        dst: Reg,
    },
    Push {
        src: Reg,
        pc: bool,
    },
    Pop {
        dst: Reg,
        pc: bool,
    },
    Jump {
        target: Reg,
    },
    JumpCond {
        target: Reg,
        test: Reg,
        cond: u8,
    },
}

impl std::fmt::Display for Insn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_asm())
    }
}

fn nibbles(val: Word) -> (Reg, Reg, Reg) {
    let ra = (val & 0x0f00) >> 8;
    let rb = (val & 0x00f0) >> 4;
    let ry = val & 0x000f;
    (ra as Reg, rb as Reg, ry as Reg)
}

fn pack(op: Opcode, ra: Reg, rb: Reg, ry: Reg) -> Word {
    op.bits() | ((ra as Word & 0xf) << 8) | ((rb as Word & 0xf) << 4) | (ry as Word & 0xf)
}

impl Insn {
    pub fn opcode(&self) -> Opcode {
        match self {
            Insn::Move { .. } => Opcode::Move,
            Insn::LoadImm { .. } => Opcode::LoadImm,
            Insn::Store { .. } => Opcode::Store,
            Insn::Load { .. } => Opcode::Load,
            Insn::Alu { op, .. } => op.opcode(),
            Insn::Unary { op, .. } => op.opcode(),
            Insn::Push { .. } => Opcode::Push,
            Insn::Pop { .. } => Opcode::Pop,
            Insn::Jump { .. } => Opcode::Jump,
            Insn::JumpCond { .. } => Opcode::JumpCond,
        }
    }

    /// Number of instruction-bank words the instruction occupies.
    pub fn words(&self) -> usize {
        match self {
            Insn::LoadImm { .. } => 2,
            _ => 1,
        }
    }

    pub fn encode(&self) -> Word {
        let op = self.opcode();
        match *self {
            Insn::Move { src, dst } => pack(op, src, 0, dst),
            Insn::LoadImm { dst } => pack(op, 0, 0, dst),
            Insn::Store { src, addr } => pack(op, src, addr, 0),
            Insn::Load { addr, mark, dst } => pack(op, addr, mark, dst),
            Insn::Alu { a, b, dst, .. } => pack(op, a, b, dst),
            Insn::Unary { src, dst, .. } => pack(op, src, 0, dst),
            Insn::Push { src, pc } => pack(op, src, 0, 0) | ((pc as Word) << 7),
            // the decoder shifts this bit out again, see `decode`
            Insn::Pop { dst, pc } => pack(op, 0, 0, dst) | ((pc as Word) << 4),
            Insn::Jump { target } => pack(op, target, 0, 0),
            Insn::JumpCond { target, test, cond } => pack(op, target, test, cond as Reg),
        }
    }

    pub fn decode(val: Word) -> Insn {
        let (ra, rb, ry) = nibbles(val);
        match Opcode::of(val) {
            Opcode::Move => Insn::Move { src: ra, dst: ry },
            Opcode::LoadImm => Insn::LoadImm { dst: ry },
            Opcode::Store => Insn::Store { src: ra, addr: rb },
            Opcode::Load => Insn::Load {
                addr: ra,
                mark: rb,
                dst: ry,
            },
            Opcode::Or => Insn::Alu {
                op: AluOp::Or,
                a: ra,
                b: rb,
                dst: ry,
            },
            Opcode::Not => Insn::Unary {
                op: UnaryOp::Not,
                src: ra,
                dst: ry,
            },
            Opcode::And => Insn::Alu {
                op: AluOp::And,
                a: ra,
                b: rb,
                dst: ry,
            },
            Opcode::Xor => Insn::Alu {
                op: AluOp::Xor,
                a: ra,
                b: rb,
                dst: ry,
            },
            Opcode::Add => Insn::Alu {
                op: AluOp::Add,
                a: ra,
                b: rb,
                dst: ry,
            },
            Opcode::Sub => Insn::Alu {
                op: AluOp::Sub,
                a: ra,
                b: rb,
                dst: ry,
            },
            Opcode::LogicNot => Insn::Unary {
                op: UnaryOp::LogicNot,
                src: ra,
                dst: ry,
            },
            Opcode::Shr => Insn::Unary {
                op: UnaryOp::Shr,
                src: ra,
                dst: ry,
            },
            Opcode::Push => Insn::Push {
                src: ra,
                pc: (val & 0x0080) >> 7 != 0,
            },
            // masks bit 4 but shifts by 7, so this is never set
            Opcode::Pop => Insn::Pop {
                dst: ry,
                pc: (val & 0x0010) >> 7 != 0,
            },
            Opcode::Jump => Insn::Jump { target: ra },
            Opcode::JumpCond => Insn::JumpCond {
                target: ra,
                test: rb,
                cond: ry as u8,
            },
        }
    }

    pub fn brief(&self) -> &'static str {
        match self {
            Insn::Move { .. } => "MOV",
            Insn::LoadImm { .. } => "LDI",
            Insn::Store { .. } => "ST",
            Insn::Load { .. } => "LD",
            Insn::Alu { op, .. } => op.brief(),
            Insn::Unary { op, .. } => op.brief(),
            Insn::Push { .. } => "PUSH",
            Insn::Pop { .. } => "POP",
            Insn::Jump { .. } => "JMP",
            Insn::JumpCond { cond, .. } => Condition::from_u8(*cond).brief(),
        }
    }

    pub fn to_asm(&self) -> String {
        let b = self.brief();
        match *self {
            Insn::Move { src, dst } => format!("{} R{}, R{}", b, dst, src),
            Insn::LoadImm { dst } => format!("{} R{}", b, dst),
            Insn::Store { src, addr } => format!("{} [R{}], R{}", b, addr, src),
            Insn::Load { addr, dst, .. } => format!("{} R{}, [R{}]", b, dst, addr),
            Insn::Alu { a, b: rb, dst, .. } => format!("{} R{}, R{}, R{}", b, dst, a, rb),
            Insn::Unary { src, dst, .. } => format!("{} R{}, R{}", b, dst, src),
            Insn::Push { pc: true, .. } => format!("{} PC", b),
            Insn::Push { src, .. } => format!("{} R{}", b, src),
            Insn::Pop { pc: true, .. } => format!("{} PC", b),
            Insn::Pop { dst, .. } => format!("{} R{}", b, dst),
            Insn::Jump { target } => format!("{} R{}", b, target),
            Insn::JumpCond { target, test, .. } => format!("{} R{}, R{}", b, target, test),
        }
    }
}

/// One line of a program listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listed {
    pub addr: usize,
    pub word: Word,
    pub text: String,
}

/// Walks `words` from address 0, treating the word after each load-immediate
/// as its literal rather than as an instruction.
pub fn disassemble(words: &[Word]) -> Vec<Listed> {
    let mut out = Vec::with_capacity(words.len());
    let mut addr = 0;
    while addr < words.len() {
        let insn = Insn::decode(words[addr]);
        out.push(Listed {
            addr,
            word: words[addr],
            text: insn.to_asm(),
        });
        if let Insn::LoadImm { .. } = insn {
            if let Some(&lit) = words.get(addr + 1) {
                out.push(Listed {
                    addr: addr + 1,
                    word: lit,
                    text: format!(".WORD 0x{:04X}", lit),
                });
            }
        }
        addr += insn.words();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn opcode_nibble_matches_variant_order() {
        for (i, op) in Opcode::all().enumerate() {
            assert_eq!(Opcode::of((i as Word) << 12), op);
            assert_eq!(op.bits(), (i as Word) << 12);
        }
        assert_eq!(Opcode::all().count(), 16);
    }

    #[test]
    fn fields() {
        assert_eq!(
            Insn::decode(0x8123),
            Insn::Alu {
                op: AluOp::Add,
                a: 1,
                b: 2,
                dst: 3
            }
        );
        assert_eq!(Insn::decode(0x1005), Insn::LoadImm { dst: 5 });
        assert_eq!(
            Insn::decode(0x3abc),
            Insn::Load {
                addr: 0xa,
                mark: 0xb,
                dst: 0xc
            }
        );
        assert_eq!(Insn::decode(0xc480), Insn::Push { src: 4, pc: true });
        assert_eq!(Insn::decode(0xc400), Insn::Push { src: 4, pc: false });
    }

    #[test]
    fn pop_flag_is_shifted_out() {
        for low in 0..=0x0fffu16 {
            match Insn::decode(0xd000 | low) {
                Insn::Pop { pc, .. } => assert!(!pc, "{:04x}", low),
                other => panic!("decoded {:?}", other),
            }
        }
    }

    #[test]
    fn conditions() {
        assert!(Condition::from_u8(0).holds(0));
        assert!(!Condition::from_u8(0).holds(1));
        assert!(Condition::from_u8(1).holds(1));
        assert!(Condition::from_u8(2).holds(0x1000));
        assert!(!Condition::from_u8(2).holds(0x8000));
        assert!(Condition::from_u8(3).holds(0x8000));
        assert!(!Condition::from_u8(3).holds(0x1001));
        for c in 4..16 {
            assert!(!Condition::from_u8(c).holds(0));
            assert!(!Condition::from_u8(c).holds(0xffff));
        }
    }

    #[test]
    fn listing_skips_literals() {
        let l = disassemble(&[0x1003, 0x1005, 0x2310, 0xe100]);
        let text: Vec<_> = l.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(text, ["LDI R3", ".WORD 0x1005", "ST [R1], R3", "JMP R1"]);
        assert_eq!(l[3].addr, 3);
    }

    #[test]
    fn trailing_load_immediate() {
        let l = disassemble(&[0x0000, 0x1001]);
        assert_eq!(l.len(), 2);
        assert_eq!(l[1].text, "LDI R1");
    }

    proptest! {
        #[test]
        fn encode_keeps_every_decoded_field(val in any::<u16>()) {
            let insn = Insn::decode(val);
            prop_assert_eq!(Insn::decode(insn.encode()), insn);
            prop_assert_eq!(insn.encode() & 0xf000, val & 0xf000);
        }
    }
}
