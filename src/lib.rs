//! # Redcode MARS
//!
//! A battle simulator for Redcode warriors.
//!
//! Warriors are small assembly programs loaded into one shared circular core.
//! They take turns executing one instruction per round and win by making
//! every opponent run out of threads.

pub mod asm;
pub mod mars;

// Re-export commonly used types
pub use asm::{assemble, disassemble, AssemblerError};
pub use mars::{
    ConfigError, Core, Event, Fault, Instruction, Mars, MarsConfig, MarsError, MarsState, Mode, OpCode,
    TaskQueue, Warrior,
};
