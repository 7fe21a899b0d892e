use crate::drivers::tty;
use crate::error::{KernelError, KernelResult};
use crate::hw::{Hardware, Word};
use crate::interrupts::Irq;
use crate::kernel::Kernel;
use crate::scheduler::{BlockReason, Pid};
use crate::{log_debug, log_info, log_warn};

/// Syscall numbers (passed in A by the calling process).
pub const SYS_READ: Word = 1;
pub const SYS_WRITE: Word = 2;
pub const SYS_CREATE_PROC: Word = 7;
pub const SYS_KILL_PROC: Word = 8;
pub const SYS_WAIT_PROC: Word = 9;

/// Value left in A when a request fails.
pub const FAILURE: Word = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Read,
    Write,
    CreateProcess,
    KillProcess,
    WaitProcess,
}

impl Syscall {
    pub fn from_word(number: Word) -> Option<Syscall> {
        match number {
            SYS_READ => Some(Syscall::Read),
            SYS_WRITE => Some(Syscall::Write),
            SYS_CREATE_PROC => Some(Syscall::CreateProcess),
            SYS_KILL_PROC => Some(Syscall::KillProcess),
            SYS_WAIT_PROC => Some(Syscall::WaitProcess),
            _ => None,
        }
    }
}

impl<H: Hardware> Kernel<H> {
    /// Central syscall dispatcher. Arguments come from the caller's saved
    /// context: A = number, X = argument. Results go back in A.
    pub(crate) fn syscall(&mut self) -> KernelResult<()> {
        let pid = self.current.ok_or(KernelError::NoCurrentProcess(Irq::Syscall))?;
        let (number, arg) = match self.table.get(pid) {
            Some(p) => (p.context.a, p.context.x),
            None => return Err(KernelError::NoCurrentProcess(Irq::Syscall)),
        };
        log_debug!("SO: syscall {} from pid {}", number, pid);

        match Syscall::from_word(number) {
            Some(Syscall::Read) => self.sys_read(pid),
            Some(Syscall::Write) => self.sys_write(pid, arg),
            Some(Syscall::CreateProcess) => self.sys_create_proc(pid, arg),
            Some(Syscall::KillProcess) => self.sys_kill_proc(pid, arg),
            Some(Syscall::WaitProcess) => self.sys_wait_proc(pid, arg),
            None => {
                log_warn!("SO: unknown system call {}", number);
                return Err(KernelError::UnknownSyscall(number));
            }
        }
        Ok(())
    }

    fn set_result(&mut self, pid: Pid, value: Word) {
        if let Some(p) = self.table.get_mut(pid) {
            p.context.a = value;
        }
    }

    fn sys_read(&mut self, pid: Pid) {
        let Some(p) = self.table.get_mut(pid) else { return };
        let terminal = p.terminal;
        match tty::input_ready(&mut self.hw, terminal) {
            Ok(true) => {
                let result = tty::read_input(&mut self.hw, terminal).unwrap_or(FAILURE);
                p.context.a = result;
            }
            Ok(false) => {
                self.block_current(pid, BlockReason::Read);
            }
            Err(e) => {
                log_warn!("SO: terminal {} unusable: {}", terminal, e.name());
                p.context.a = FAILURE;
            }
        }
    }

    fn sys_write(&mut self, pid: Pid, value: Word) {
        let Some(p) = self.table.get_mut(pid) else { return };
        let terminal = p.terminal;
        match tty::output_ready(&mut self.hw, terminal) {
            Ok(true) => {
                p.context.a = match tty::write_output(&mut self.hw, terminal, value) {
                    Ok(()) => 0,
                    Err(_) => FAILURE,
                };
            }
            Ok(false) => {
                log_info!("SO: pid {} blocked writing", pid);
                self.block_current(pid, BlockReason::Write(value));
            }
            Err(e) => {
                log_warn!("SO: terminal {} unusable: {}", terminal, e.name());
                p.context.a = FAILURE;
            }
        }
    }

    fn sys_create_proc(&mut self, pid: Pid, name_addr: Word) {
        let result = match self.copy_str_from_process(pid, name_addr) {
            Ok(name) => match self.spawn(&name) {
                Ok(child) => child.0,
                Err(e) => {
                    log_warn!("SO: cannot create '{}': {}", name, e);
                    FAILURE
                }
            },
            Err(e) => {
                log_warn!("SO: bad program name at V{} from pid {}: {}", name_addr, pid, e);
                FAILURE
            }
        };
        self.set_result(pid, result);
    }

    fn sys_kill_proc(&mut self, pid: Pid, target: Word) {
        if target == 0 || Pid(target) == pid {
            self.kill(pid);
            return;
        }
        let result = match self.kill(Pid(target)) {
            Some(_) => 0,
            None => FAILURE,
        };
        self.set_result(pid, result);
    }

    fn sys_wait_proc(&mut self, pid: Pid, target: Word) {
        let target = Pid(target);
        if target == pid || !self.table.contains(target) {
            self.set_result(pid, FAILURE);
            return;
        }
        self.set_result(pid, 0);
        self.charge_cpu(pid);
        let now = self.hw.now();
        if let Some(p) = self.table.get_mut(pid) {
            p.wait_for(target, now);
        }
        self.current = None;
        log_info!("SO: pid {} waits for pid {}", pid, target);
    }

    fn block_current(&mut self, pid: Pid, reason: BlockReason) {
        self.charge_cpu(pid);
        let now = self.hw.now();
        if let Some(p) = self.table.get_mut(pid) {
            p.block(reason, now);
        }
        self.current = None;
    }
}
