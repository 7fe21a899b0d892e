use crate::hw::{CpuErr, CpuMode, Reg, Registers, Word};

/// CPU register context saved/restored on every interrupt.
/// This is the whole register set the simulated CPU exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuContext {
    pub pc: Word,
    pub a: Word,
    pub x: Word,
    pub err: CpuErr,
    pub complement: Word,
    pub mode: CpuMode,
}

impl CpuContext {
    /// Context of a fresh user process about to start at `entry`.
    pub fn new(entry: Word) -> Self {
        CpuContext {
            pc: entry,
            a: 0,
            x: 0,
            err: CpuErr::Ok,
            complement: 0,
            mode: CpuMode::User,
        }
    }

    /// Copy the registers the CPU saved on interrupt entry.
    pub fn save_from<R: Registers + ?Sized>(&mut self, regs: &R) {
        self.pc = regs.read_reg(Reg::Pc);
        self.a = regs.read_reg(Reg::A);
        self.x = regs.read_reg(Reg::X);
        self.err = CpuErr::from_word(regs.read_reg(Reg::Err));
        self.complement = regs.read_reg(Reg::Complement);
        self.mode = CpuMode::from_word(regs.read_reg(Reg::Mode));
    }

    /// Write the context back so the CPU resumes it on return from interrupt.
    pub fn restore_to<R: Registers + ?Sized>(&self, regs: &mut R) {
        regs.write_reg(Reg::Pc, self.pc);
        regs.write_reg(Reg::A, self.a);
        regs.write_reg(Reg::X, self.x);
        regs.write_reg(Reg::Err, self.err.to_word());
        regs.write_reg(Reg::Complement, self.complement);
        regs.write_reg(Reg::Mode, self.mode.to_word());
    }
}
