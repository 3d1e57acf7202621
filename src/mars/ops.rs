//! Operand resolution and operation semantics.
//!
//! Both operands of an instruction are resolved against the executing
//! cell's address before the operation runs. The operation then acts on an
//! [`Context`] holding the resolved operands, the core, the executing
//! warrior's task queue and the continuation address.

use thiserror::Error;

use crate::mars::core::Core;
use crate::mars::instruction::{Mode, OpCode};
use crate::mars::warrior::TaskQueue;

/// A resolved operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    /// The number the operation reads.
    pub value: i64,
    /// The cell the operation writes or jumps to.
    pub address: usize,
}

/// Resolve one operand of the instruction at `pc`.
///
/// Direct and indirect targets always yield the target cell's A-field as the
/// value.
pub fn resolve(core: &Core, pc: usize, mode: Mode, field: i64) -> Operand {
    match mode {
        Mode::Immediate => Operand { value: field, address: pc },
        Mode::Direct => {
            let address = displace(core, pc, field);
            Operand { value: core.read(address as i64).a_field, address }
        }
        Mode::Indirect => {
            let pointer = displace(core, pc, field);
            let address = displace(core, pointer, core.read(pointer as i64).a_field);
            Operand { value: core.read(address as i64).a_field, address }
        }
    }
}

/// `base + offset` folded into the core, for any `i64` offset.
fn displace(core: &Core, base: usize, offset: i64) -> usize {
    core.fold(base as i64 + core.fold(offset) as i64)
}

/// Everything an operation may touch.
#[derive(Debug)]
pub struct Context<'a> {
    pub core: &'a mut Core,
    pub a: Operand,
    pub b: Operand,
    /// Where the current thread continues; `None` ends the thread.
    pub next_pc: Option<usize>,
    /// Queue of the executing warrior, current thread already removed.
    pub tasks: &'a mut TaskQueue,
    pub max_tasks: usize,
}

/// A run-time fault that kills the executing thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("division by zero")]
    DivisionByZero,

    #[error("modulo by zero")]
    ModuloByZero,
}

/// Apply `op` to the context.
///
/// On a fault nothing is written and the thread is ended.
pub fn execute(op: OpCode, ctx: &mut Context<'_>) -> Result<(), Fault> {
    let (a, b) = (ctx.a, ctx.b);

    match op {
        // ==================== Data ====================
        OpCode::Dat => {
            ctx.next_pc = None;
        }

        OpCode::Mov => {
            ctx.core.read_mut(b.address as i64).a_field = a.value;
        }

        // ==================== Arithmetic ====================
        OpCode::Add => {
            ctx.core.read_mut(b.address as i64).a_field = b.value.wrapping_add(a.value);
        }

        OpCode::Sub => {
            ctx.core.read_mut(b.address as i64).a_field = b.value.wrapping_sub(a.value);
        }

        OpCode::Mul => {
            ctx.core.read_mut(b.address as i64).a_field = b.value.wrapping_mul(a.value);
        }

        OpCode::Div => {
            if a.value == 0 {
                ctx.next_pc = None;
                return Err(Fault::DivisionByZero);
            }
            ctx.core.read_mut(b.address as i64).a_field = b.value.wrapping_div(a.value);
        }

        OpCode::Mod => {
            if a.value == 0 {
                ctx.next_pc = None;
                return Err(Fault::ModuloByZero);
            }
            ctx.core.read_mut(b.address as i64).a_field = b.value.wrapping_rem(a.value);
        }

        // ==================== Branching ====================
        OpCode::Jmp => {
            ctx.next_pc = Some(a.address);
        }

        OpCode::Jmz => {
            if a.value == 0 {
                ctx.next_pc = Some(b.address);
            }
        }

        OpCode::Cmp => {
            if a.value == b.value {
                ctx.next_pc = ctx.next_pc.map(|pc| ctx.core.fold(pc as i64 + 1));
            }
        }

        // ==================== Special ====================
        OpCode::Frk => {
            // Room for the fork and this thread's own continuation.
            if ctx.tasks.len() + 2 <= ctx.max_tasks {
                ctx.tasks.enqueue(a.address);
            }
        }

        OpCode::Clr => {
            ctx.core.read_mut(a.address as i64).clear();
        }

        OpCode::Cpy => {
            let copy = *ctx.core.read(a.address as i64);
            ctx.core.write(b.address as i64, copy);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mars::instruction::Instruction;
    use proptest::prelude::*;

    const SIZE: usize = 64;

    fn data(value: i64) -> Instruction {
        Instruction::new(OpCode::Dat, Mode::Direct, value, Mode::Direct, 0)
    }

    fn run(op: OpCode, core: &mut Core, tasks: &mut TaskQueue, a: Operand, b: Operand, pc: usize) -> (Option<usize>, Result<(), Fault>) {
        let mut ctx = Context {
            next_pc: Some(core.fold(pc as i64 + 1)),
            core,
            a,
            b,
            tasks,
            max_tasks: 16,
        };
        let result = execute(op, &mut ctx);
        (ctx.next_pc, result)
    }

    #[test]
    fn test_resolve_immediate() {
        let core = Core::new(SIZE);
        assert_eq!(resolve(&core, 10, Mode::Immediate, -7), Operand { value: -7, address: 10 });
    }

    #[test]
    fn test_resolve_direct_reads_a_field() {
        let mut core = Core::new(SIZE);
        core.write(13, Instruction::new(OpCode::Dat, Mode::Direct, 5, Mode::Direct, 99));

        assert_eq!(resolve(&core, 10, Mode::Direct, 3), Operand { value: 5, address: 13 });
        // Wraps backwards from address 0.
        core.write(SIZE as i64 - 2, data(11));
        assert_eq!(resolve(&core, 0, Mode::Direct, -2), Operand { value: 11, address: SIZE - 2 });
    }

    #[test]
    fn test_resolve_indirect() {
        let mut core = Core::new(SIZE);
        core.write(12, data(4)); // pointer
        core.write(16, data(-9)); // target

        assert_eq!(resolve(&core, 10, Mode::Indirect, 2), Operand { value: -9, address: 16 });
    }

    #[test]
    fn test_resolve_extreme_fields() {
        let mut core = Core::new(SIZE);
        let size = SIZE as i64;

        for field in [i64::MAX, i64::MIN] {
            let expected = core.fold(10 + field.rem_euclid(size));
            assert_eq!(resolve(&core, 10, Mode::Direct, field).address, expected);
        }

        // Pointer cells holding extreme A-fields.
        core.write(12, data(i64::MAX));
        let target = core.fold(12 + i64::MAX.rem_euclid(size));
        assert_eq!(resolve(&core, 10, Mode::Indirect, 2).address, target);

        core.write(12, data(i64::MIN));
        let target = core.fold(12 + i64::MIN.rem_euclid(size));
        assert_eq!(resolve(&core, 10, Mode::Indirect, 2).address, target);

        // Extreme field through an extreme pointer.
        let pointer = core.fold(SIZE as i64 - 1 + i64::MAX.rem_euclid(size));
        core.write(pointer as i64, data(i64::MIN));
        let target = core.fold(pointer as i64 + i64::MIN.rem_euclid(size));
        let operand = resolve(&core, SIZE - 1, Mode::Indirect, i64::MAX);
        assert_eq!(operand.address, target);
        assert_eq!(operand.value, core.read(target as i64).a_field);
    }

    #[test]
    fn test_arithmetic_writes_b_a_field() {
        let mut core = Core::new(SIZE);
        let mut tasks = TaskQueue::new();
        let a = Operand { value: 3, address: 0 };
        let b = Operand { value: -10, address: 20 };

        let cases = [
            (OpCode::Mov, 3),
            (OpCode::Add, -7),
            (OpCode::Sub, -13),
            (OpCode::Mul, -30),
            (OpCode::Div, -3),
            (OpCode::Mod, -1),
        ];
        for (op, expected) in cases {
            let (next, result) = run(op, &mut core, &mut tasks, a, b, 0);
            assert!(result.is_ok());
            assert_eq!(next, Some(1));
            assert_eq!(core.read(20).a_field, expected, "{op}");
        }
    }

    #[test]
    fn test_division_by_zero_faults() {
        let mut core = Core::new(SIZE);
        let mut tasks = TaskQueue::new();
        core.write(20, data(8));
        let zero = Operand { value: 0, address: 0 };
        let b = Operand { value: 8, address: 20 };

        let (next, result) = run(OpCode::Div, &mut core, &mut tasks, zero, b, 0);
        assert_eq!(result, Err(Fault::DivisionByZero));
        assert_eq!(next, None);

        let (next, result) = run(OpCode::Mod, &mut core, &mut tasks, zero, b, 0);
        assert_eq!(result, Err(Fault::ModuloByZero));
        assert_eq!(next, None);
        assert_eq!(core.read(20).a_field, 8);
    }

    #[test]
    fn test_dat_ends_thread() {
        let mut core = Core::new(SIZE);
        let mut tasks = TaskQueue::new();
        let op = Operand { value: 0, address: 0 };
        let (next, _) = run(OpCode::Dat, &mut core, &mut tasks, op, op, 5);
        assert_eq!(next, None);
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_jumps() {
        let mut core = Core::new(SIZE);
        let mut tasks = TaskQueue::new();
        let target = Operand { value: 1, address: 30 };
        let zero = Operand { value: 0, address: 40 };

        let (next, _) = run(OpCode::Jmp, &mut core, &mut tasks, target, zero, 5);
        assert_eq!(next, Some(30));

        let (next, _) = run(OpCode::Jmz, &mut core, &mut tasks, zero, target, 5);
        assert_eq!(next, Some(30));

        let (next, _) = run(OpCode::Jmz, &mut core, &mut tasks, target, zero, 5);
        assert_eq!(next, Some(6));
    }

    #[test]
    fn test_cmp_skips_on_equal() {
        let mut core = Core::new(SIZE);
        let mut tasks = TaskQueue::new();
        let one = Operand { value: 1, address: 0 };
        let two = Operand { value: 2, address: 0 };

        let (next, _) = run(OpCode::Cmp, &mut core, &mut tasks, one, one, SIZE - 1);
        assert_eq!(next, Some(1));

        let (next, _) = run(OpCode::Cmp, &mut core, &mut tasks, one, two, SIZE - 1);
        assert_eq!(next, Some(0));
    }

    #[test]
    fn test_frk_enqueues_new_thread() {
        let mut core = Core::new(SIZE);
        let mut tasks = TaskQueue::new();
        let target = Operand { value: 0, address: 9 };

        let (next, _) = run(OpCode::Frk, &mut core, &mut tasks, target, target, 4);
        assert_eq!(next, Some(5));
        assert_eq!(tasks.iter().collect::<Vec<_>>(), vec![9]);
    }

    #[test]
    fn test_frk_respects_max_tasks() {
        let mut core = Core::new(SIZE);
        let mut tasks = TaskQueue::new();
        for pc in 0..15 {
            tasks.enqueue(pc);
        }
        let target = Operand { value: 0, address: 9 };

        // 15 queued + continuation = 16: no room for a fork.
        let (next, _) = run(OpCode::Frk, &mut core, &mut tasks, target, target, 4);
        assert_eq!(next, Some(5));
        assert_eq!(tasks.len(), 15);
    }

    #[test]
    fn test_clr_and_cpy() {
        let mut core = Core::new(SIZE);
        let mut tasks = TaskQueue::new();
        let mov = Instruction::new(OpCode::Mov, Mode::Immediate, 1, Mode::Indirect, 2);
        core.write(7, mov);
        let src = Operand { value: 1, address: 7 };
        let dst = Operand { value: 0, address: 50 };

        run(OpCode::Cpy, &mut core, &mut tasks, src, dst, 0);
        assert_eq!(*core.read(50), mov);

        run(OpCode::Clr, &mut core, &mut tasks, src, dst, 0);
        assert!(core.read(7).is_cleared());
        assert_eq!(*core.read(50), mov);
    }

    proptest! {
        #[test]
        fn prop_direct_reads_target(pc in 0usize..SIZE, offset in -500i64..500, value in any::<i64>()) {
            let mut core = Core::new(SIZE);
            core.write(pc as i64 + offset, data(value));
            let operand = resolve(&core, pc, Mode::Direct, offset);
            prop_assert_eq!(operand.value, value);
            prop_assert_eq!(operand.address, core.fold(pc as i64 + offset));
        }

        #[test]
        fn prop_indirect_follows_pointer(pc in 0usize..SIZE, d in -200i64..200, d2 in -200i64..200) {
            let mut core = Core::new(SIZE);
            let pointer = core.fold(pc as i64 + d);
            let target = core.fold(pointer as i64 + d2);
            prop_assume!(pointer != target);
            core.write(pointer as i64, data(d2));
            core.write(target as i64, data(1234));

            let operand = resolve(&core, pc, Mode::Indirect, d);
            prop_assert_eq!(operand.address, target);
            prop_assert_eq!(operand.value, 1234);
        }
    }
}
