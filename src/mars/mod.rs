//! The Redcode virtual machine.
//!
//! This module implements the match side of the simulator:
//! - a circular core of instruction cells with folded addressing
//! - thirteen operations over immediate, direct and indirect operands
//! - per-warrior FIFO thread queues, stepped round-robin

pub mod config;
pub mod core;
pub mod engine;
pub mod instruction;
pub mod ops;
pub mod warrior;

pub use self::config::{ConfigError, MarsConfig};
pub use self::core::Core;
pub use self::engine::{Event, Mars, MarsError, MarsState};
pub use self::instruction::{Instruction, Mode, OpCode};
pub use self::ops::{Fault, Operand};
pub use self::warrior::{TaskQueue, Warrior};
