use std::sync::atomic::{AtomicUsize, Ordering};

use atomic_sim::serial::{self, Level};
use atomic_sim::syscalls::SYS_CREATE_PROC;
use atomic_sim::{Dispatch, Kernel, KernelConfig, Pid, Reg, SimMachine};

static ECHOED: AtomicUsize = AtomicUsize::new(0);

fn count_line(_line: &str) {
    ECHOED.fetch_add(1, Ordering::Relaxed);
}

fn has(lines: &[String], wanted: &str) -> bool {
    lines.iter().any(|l| l == wanted)
}

// One test per binary: the log is global.
#[test]
fn test_kernel_log_lines() {
    serial::set_level(Level::Debug);
    serial::set_echo(Some(count_line));
    serial::drain();

    let mut hw = SimMachine::new(2000, 4);
    hw.add_program_text("init.maq", "@0\n1 2 3 \"p1.maq\"").unwrap();
    hw.add_program_text("p1.maq", "5 6 7").unwrap();
    let mut kernel = Kernel::new(hw, KernelConfig::default()).unwrap();
    assert_eq!(kernel.handle_interrupt(0), Ok(Dispatch::Running(Pid(1))));

    let boot = serial::drain();
    assert!(has(&boot, "[INFO] SO: IRQ 0 (reset)"));
    assert!(has(&boot, "[INFO] SO: reset, 'init.maq' is pid 1 on terminal 0"));
    assert!(boot.iter().any(|l| l.starts_with("[DEBUG] SO: 'init.maq' staged at S0-")));

    kernel.hw_mut().set_reg(Reg::A, SYS_CREATE_PROC);
    kernel.hw_mut().set_reg(Reg::X, 3);
    kernel.handle_interrupt(2).unwrap();

    let lines = serial::drain();
    assert!(has(&lines, "[INFO] SO: IRQ 2 (syscall)"));
    assert!(has(&lines, "[DEBUG] SO: syscall 7 from pid 1"));
    assert!(has(&lines, "[INFO] SO: created pid 2 'p1.maq' on terminal 1"));
    assert!(ECHOED.load(Ordering::Relaxed) >= boot.len() + lines.len());

    // below the level nothing is kept
    serial::set_level(Level::Warn);
    kernel.handle_interrupt(3).unwrap();
    assert!(serial::drain().is_empty());

    kernel.handle_interrupt(42).unwrap_err();
    let fatal = serial::drain();
    assert!(has(&fatal, "[WARN] SO: cannot handle IRQ 42"));
    assert!(has(&fatal, "[ERROR] SO: Unknown IRQ 42"));

    serial::set_echo(None);
    serial::set_level(Level::Info);
}
