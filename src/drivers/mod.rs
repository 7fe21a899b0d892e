//! Device drivers. The machine has terminals and nothing else.

pub mod tty;
