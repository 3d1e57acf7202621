//! Listings of warriors and core contents.

use crate::mars::core::Core;
use crate::mars::instruction::Instruction;
use crate::mars::warrior::Warrior;

/// Numbered listing of a slice of instructions, one per line.
pub fn disassemble(instructions: &[Instruction]) -> String {
    let mut output = String::new();

    for (addr, instr) in instructions.iter().enumerate() {
        output.push_str(&format!("{addr:04}: {instr}\n"));
    }

    output
}

/// Listing of an assembled warrior, with the origin marked.
pub fn listing(warrior: &Warrior) -> String {
    let origin = warrior.tasks.peek();
    let mut output = String::new();
    output.push_str(&format!("; {}\n", warrior.name));
    output.push_str(&format!("; {} instructions\n\n", warrior.len()));

    for (addr, instr) in warrior.instructions.iter().enumerate() {
        let marker = if origin == Some(addr) { ">" } else { " " };
        output.push_str(&format!("{marker}{addr:04}: {instr}\n"));
    }

    output
}

/// Occupied cells of `[start, start + count)`, one per line.
pub fn dump_core(core: &Core, start: usize, count: usize) -> String {
    core.dump(start, count)
        .into_iter()
        .map(|(addr, instr)| format!("{addr:05}: {instr}\n"))
        .collect()
}
