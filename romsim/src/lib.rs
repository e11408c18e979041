//! Step-through simulator for a 16-bit machine with separate instruction,
//! data and stack banks.

mod isa;
pub mod loader;
pub mod prompt;
pub mod render;
mod sim;

pub use isa::*;
pub use sim::*;

#[cfg_attr(test, test)]
pub fn runtest() {
    // LDI R1, 0x00AA ; LDI R2, 0x0040 ; ST [R2], R1 ; LDI R3, 0x0008 ; JMP R3 ; 8: JMP R3
    let mut m = Machine::new();
    m.load(&[0x1001, 0x00aa, 0x1002, 0x0040, 0x2120, 0x1003, 0x0008, 0xe300, 0xe300]);
    m.step(5);
    assert_eq!(m.regs().read(1), 0xaa);
    assert_eq!(m.bank(Bank::Data).read(0x40), 0xaa);
    assert_eq!(m.pc(), 8);
    m.step(10);
    assert_eq!(m.pc(), 8);
}
