//! Warriors and their thread queues.
//!
//! A warrior is a named program plus a FIFO of pending program counters.
//! Each queue entry is one thread; the warrior is alive while the queue is
//! non-empty.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::mars::instruction::Instruction;

/// FIFO of pending program-counter addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskQueue {
    pcs: VecDeque<usize>,
}

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a thread at the back.
    #[inline]
    pub fn enqueue(&mut self, pc: usize) {
        self.pcs.push_back(pc);
    }

    /// Take the next thread from the front.
    #[inline]
    pub fn dequeue(&mut self) -> Option<usize> {
        self.pcs.pop_front()
    }

    /// The thread that will run next.
    #[inline]
    pub fn peek(&self) -> Option<usize> {
        self.pcs.front().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pcs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pcs.is_empty()
    }

    /// Pending program counters, front first.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.pcs.iter().copied()
    }
}

/// A loaded program competing in a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warrior {
    /// Display name, uniquified by load order once placed.
    pub name: String,
    /// Compiled program, copied into the core at placement.
    pub instructions: Vec<Instruction>,
    /// Live threads.
    pub tasks: TaskQueue,
    /// Address of the first thread once placed (0 before placement).
    pub start: usize,
}

impl Warrior {
    /// Create a warrior whose single thread starts at `pc`.
    pub fn new(name: impl Into<String>, pc: usize, instructions: Vec<Instruction>) -> Self {
        let mut tasks = TaskQueue::new();
        tasks.enqueue(pc);
        Self {
            name: name.into(),
            instructions,
            tasks,
            start: pc,
        }
    }

    /// Number of compiled instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.tasks.is_empty()
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.tasks.is_empty()
    }
}
