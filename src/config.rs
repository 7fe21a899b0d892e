//! Kernel tunables.

use alloc::string::String;
use core::fmt;
use core::str::FromStr;

use crate::error::ConfigError;

/// How the ready queue orders processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    /// Round robin: arrival order.
    Fifo,
    /// Lowest priority value first, arrival order among equals.
    Priority,
}

impl Default for SchedPolicy {
    fn default() -> Self {
        SchedPolicy::Fifo
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SchedPolicy::Fifo => write!(f, "fifo"),
            SchedPolicy::Priority => write!(f, "priority"),
        }
    }
}

impl FromStr for SchedPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fifo" | "rr" | "round-robin" => Ok(SchedPolicy::Fifo),
            "prio" | "priority" => Ok(SchedPolicy::Priority),
            _ => Err(ConfigError::UnknownPolicy(String::from(s))),
        }
    }
}

/// When program pages are copied into physical memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Every page at load time.
    Eager,
    /// On the first page fault that touches the page.
    OnDemand,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        LoadPolicy::Eager
    }
}

impl fmt::Display for LoadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadPolicy::Eager => write!(f, "eager"),
            LoadPolicy::OnDemand => write!(f, "on-demand"),
        }
    }
}

impl FromStr for LoadPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eager" => Ok(LoadPolicy::Eager),
            "on-demand" | "ondemand" | "demand" | "lazy" => Ok(LoadPolicy::OnDemand),
            _ => Err(ConfigError::UnknownPolicy(String::from(s))),
        }
    }
}

/// Kernel configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Instructions between clock interrupts
    pub timer_interval: i32,
    /// Clock interrupts a process may run before preemption
    pub quantum: i32,
    /// Process table slots
    pub table_size: usize,
    /// Terminals available for processes
    pub terminals: usize,
    /// Words per page and per frame
    pub page_size: usize,
    /// Low physical words never handed to programs
    pub reserved_words: usize,
    /// Secondary storage capacity in words
    pub secondary_size: usize,
    /// Programs the secondary storage catalog can hold
    pub max_programs: usize,
    /// Longest program name copied out of a process
    pub max_name_len: usize,
    /// Program started on reset
    pub init_program: String,
    pub sched_policy: SchedPolicy,
    pub load_policy: LoadPolicy,
    /// Priority given to new processes
    pub default_priority: i32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            timer_interval: 20,
            quantum: 5,
            table_size: 10,
            terminals: 4,
            page_size: 10,
            reserved_words: 100,
            secondary_size: 10000,
            max_programs: 20,
            max_name_len: 100,
            init_program: String::from("init.maq"),
            sched_policy: SchedPolicy::Fifo,
            load_policy: LoadPolicy::Eager,
            default_priority: 50,
        }
    }
}

impl KernelConfig {
    pub fn with_quantum(mut self, quantum: i32) -> Self {
        self.quantum = quantum;
        self
    }

    pub fn with_timer_interval(mut self, interval: i32) -> Self {
        self.timer_interval = interval;
        self
    }

    pub fn with_table_size(mut self, slots: usize) -> Self {
        self.table_size = slots;
        self
    }

    pub fn with_terminals(mut self, terminals: usize) -> Self {
        self.terminals = terminals;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_init_program(mut self, name: &str) -> Self {
        self.init_program = String::from(name);
        self
    }

    pub fn with_sched_policy(mut self, policy: SchedPolicy) -> Self {
        self.sched_policy = policy;
        self
    }

    pub fn with_load_policy(mut self, policy: LoadPolicy) -> Self {
        self.load_policy = policy;
        self
    }

    pub fn with_secondary(mut self, size: usize, max_programs: usize) -> Self {
        self.secondary_size = size;
        self.max_programs = max_programs;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quantum <= 0 {
            return Err(ConfigError::ZeroQuantum);
        }
        if self.timer_interval <= 0 {
            return Err(ConfigError::ZeroTimerInterval);
        }
        if self.table_size == 0 {
            return Err(ConfigError::ZeroTableSize);
        }
        if self.terminals == 0 {
            return Err(ConfigError::ZeroTerminals);
        }
        if self.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.max_programs == 0 {
            return Err(ConfigError::ZeroMaxPrograms);
        }
        if self.init_program.is_empty() {
            return Err(ConfigError::EmptyInitProgram);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let c = KernelConfig::default();
        assert_eq!(c.validate(), Ok(()));
        assert_eq!(c.quantum, 5);
        assert_eq!(c.init_program, "init.maq");
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        assert_eq!(KernelConfig::default().with_quantum(0).validate(), Err(ConfigError::ZeroQuantum));
        assert_eq!(KernelConfig::default().with_terminals(0).validate(), Err(ConfigError::ZeroTerminals));
        assert_eq!(KernelConfig::default().with_page_size(0).validate(), Err(ConfigError::ZeroPageSize));
        assert_eq!(
            KernelConfig::default().with_init_program("").validate(),
            Err(ConfigError::EmptyInitProgram)
        );
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("RR".parse::<SchedPolicy>(), Ok(SchedPolicy::Fifo));
        assert_eq!("prio".parse::<SchedPolicy>(), Ok(SchedPolicy::Priority));
        assert_eq!("lazy".parse::<LoadPolicy>(), Ok(LoadPolicy::OnDemand));
        assert!("sjf".parse::<SchedPolicy>().is_err());
    }
}
