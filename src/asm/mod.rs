//! Loader and listings for Redcode warriors.
//!
//! This module provides:
//! - A two-pass loader (source text → placed-ready [`Warrior`](crate::Warrior))
//! - The `; assert` expression evaluator
//! - Listings of warriors and core ranges

pub mod assembler;
pub mod assert;
pub mod disasm;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, dump_core, listing};
