//! The match engine.
//!
//! [`Mars`] owns the core and the roster of warriors. Each call to
//! [`Mars::step`] plays one round: every surviving warrior, in load order,
//! executes the instruction at the head of its task queue. Warriors whose
//! queue runs dry are removed for good. The match ends when one warrior is
//! left, when none are left, or when the cycle limit is reached.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::asm::assembler::{assemble, AssemblerError};
use crate::mars::config::{ConfigError, MarsConfig};
use crate::mars::core::Core;
use crate::mars::instruction::Instruction;
use crate::mars::ops::{self, Context, Fault};
use crate::mars::warrior::Warrior;

/// Match state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarsState {
    /// Rounds are still being played.
    Running,
    /// Only the named warrior survived.
    Won(String),
    /// Cycle limit reached, or every warrior died.
    Tie,
}

/// Something observable that happened during a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// One instruction was executed. `instruction` is the cell as fetched.
    Step { warrior: String, address: usize, instruction: Instruction },
    /// A thread faulted and was terminated.
    Fault { warrior: String, address: usize, message: String },
    /// A warrior's last thread ended.
    Died { warrior: String },
    /// The named warrior is the sole survivor.
    Won { warrior: String },
    /// The match ended without a winner after `cycles` rounds.
    Tie { cycles: u64 },
    /// A warrior failed to load.
    Error { message: String },
}

type Subscriber = Box<dyn FnMut(&Event)>;

/// A running match.
pub struct Mars {
    config: MarsConfig,
    core: Core,
    /// Surviving warriors in turn order.
    warriors: Vec<Warrior>,
    state: MarsState,
    cycles: u64,
    /// Warriors placed so far, dead or alive.
    loaded: usize,
    /// Start address of the most recently placed warrior.
    last_start: usize,
    rng: SmallRng,
    subscribers: Vec<Subscriber>,
}

impl Mars {
    /// Create a match whose placement offsets come from OS entropy.
    pub fn new(config: MarsConfig) -> Result<Self, MarsError> {
        Self::with_rng(config, SmallRng::from_entropy())
    }

    /// Create a match with reproducible placement offsets.
    pub fn with_seed(config: MarsConfig, seed: u64) -> Result<Self, MarsError> {
        Self::with_rng(config, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(config: MarsConfig, rng: SmallRng) -> Result<Self, MarsError> {
        config.validate()?;
        Ok(Self {
            core: Core::new(config.core_size),
            config,
            warriors: Vec::new(),
            state: MarsState::Running,
            cycles: 0,
            loaded: 0,
            last_start: 0,
            rng,
            subscribers: Vec::new(),
        })
    }

    /// Register an observer for every subsequent event.
    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: FnMut(&Event) + 'static,
    {
        self.subscribers.push(Box::new(subscriber));
    }

    fn emit(&mut self, event: Event) {
        for subscriber in &mut self.subscribers {
            subscriber(&event);
        }
    }

    /// Assemble `source` and place it at a pseudo-random offset.
    ///
    /// On failure an [`Event::Error`] is emitted, the core is left untouched
    /// and the match carries on with the warriors already loaded.
    pub fn load_warrior(&mut self, source: &str) -> Result<&Warrior, MarsError> {
        let spread = self.config.core_size - self.config.max_length;
        let offset = self.core.fold(self.last_start as i64 + self.rng.gen_range(0..spread) as i64);

        match assemble(source, &self.config) {
            Ok(warrior) => self.load_warrior_at(warrior, offset),
            Err(err) => Err(self.reject(err.into())),
        }
    }

    /// Place an assembled warrior with its first instruction at `offset`.
    pub fn load_warrior_at(&mut self, warrior: Warrior, offset: usize) -> Result<&Warrior, MarsError> {
        match self.place(warrior, offset) {
            Ok(()) => Ok(self.last_loaded()),
            Err(err) => Err(self.reject(err)),
        }
    }

    fn reject(&mut self, err: MarsError) -> MarsError {
        warn!(error = %err, "warrior rejected");
        self.emit(Event::Error { message: format!("Warrior loading error: {err}") });
        err
    }

    fn last_loaded(&self) -> &Warrior {
        &self.warriors[self.warriors.len() - 1]
    }

    fn place(&mut self, mut warrior: Warrior, offset: usize) -> Result<(), MarsError> {
        warrior.name = format!("{}{}", warrior.name, self.loaded);

        let length = warrior.len();
        if length >= self.config.max_length {
            return Err(MarsError::TooLong {
                name: warrior.name,
                length,
                max: self.config.max_length,
            });
        }

        self.core.load(offset, &warrior.instructions);

        let origin = warrior.tasks.dequeue().unwrap_or(0);
        let start = self.core.fold(origin as i64 + offset as i64);
        warrior.tasks.enqueue(start);
        warrior.start = start;
        self.last_start = start;

        info!(warrior = %warrior.name, offset, start, length = warrior.len(), "warrior placed");
        self.loaded += 1;
        self.warriors.push(warrior);
        Ok(())
    }

    /// Play one round. Returns `false` once the match has ended.
    pub fn step(&mut self) -> bool {
        if self.state != MarsState::Running {
            return false;
        }

        self.cycles += 1;
        trace!(cycle = self.cycles, "round");

        let roster = std::mem::take(&mut self.warriors);
        let mut survivors = Vec::with_capacity(roster.len());
        for mut warrior in roster {
            self.step_warrior(&mut warrior);
            if warrior.is_dead() {
                debug!(warrior = %warrior.name, cycle = self.cycles, "warrior died");
                self.emit(Event::Died { warrior: warrior.name });
            } else {
                survivors.push(warrior);
            }
        }
        self.warriors = survivors;

        if self.warriors.len() == 1 {
            let name = self.warriors[0].name.clone();
            debug!(warrior = %name, cycles = self.cycles, "match won");
            self.state = MarsState::Won(name.clone());
            self.emit(Event::Won { warrior: name });
            return false;
        }
        if self.warriors.is_empty() || self.cycles >= self.config.max_cycles {
            return self.tie();
        }
        true
    }

    fn tie(&mut self) -> bool {
        debug!(cycles = self.cycles, survivors = self.warriors.len(), "match tied");
        self.state = MarsState::Tie;
        self.emit(Event::Tie { cycles: self.cycles });
        false
    }

    /// Execute the warrior's next thread.
    fn step_warrior(&mut self, warrior: &mut Warrior) {
        let Some(pc) = warrior.tasks.dequeue() else {
            return;
        };

        let instruction = *self.core.read(pc as i64);
        let a = ops::resolve(&self.core, pc, instruction.a_mode, instruction.a_field);
        let b = ops::resolve(&self.core, pc, instruction.b_mode, instruction.b_field);

        let mut ctx = Context {
            next_pc: Some(self.core.fold(pc as i64 + 1)),
            core: &mut self.core,
            a,
            b,
            tasks: &mut warrior.tasks,
            max_tasks: self.config.max_tasks,
        };
        let result = ops::execute(instruction.op, &mut ctx);
        if let Some(next) = ctx.next_pc {
            warrior.tasks.enqueue(next);
        }

        trace!(warrior = %warrior.name, address = pc, %instruction, "step");
        self.emit(Event::Step {
            warrior: warrior.name.clone(),
            address: pc,
            instruction,
        });

        if let Err(fault) = result {
            self.fault(warrior, pc, fault);
        }
    }

    fn fault(&mut self, warrior: &Warrior, address: usize, fault: Fault) {
        warn!(warrior = %warrior.name, address, %fault, "thread faulted");
        self.emit(Event::Fault {
            warrior: warrior.name.clone(),
            address,
            message: fault.to_string(),
        });
    }

    /// Play rounds until the match ends.
    pub fn run(&mut self) -> &MarsState {
        while self.step() {}
        &self.state
    }

    pub fn config(&self) -> &MarsConfig {
        &self.config
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    /// Surviving warriors in turn order.
    pub fn warriors(&self) -> &[Warrior] {
        &self.warriors
    }

    /// Rounds played so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn state(&self) -> &MarsState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == MarsState::Running
    }
}

impl std::fmt::Debug for Mars {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mars")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("warriors", &self.warriors.iter().map(|w| &w.name).collect::<Vec<_>>())
            .field("core", &self.core)
            .finish()
    }
}

/// Errors raised while setting up a match.
#[derive(Debug, Clone, Error)]
pub enum MarsError {
    #[error("{0}")]
    Assembly(#[from] AssemblerError),

    #[error("Warrior '{name}' exceeds ({length}) the instruction limit: {max}")]
    TooLong { name: String, length: usize, max: usize },

    #[error("{0}")]
    Config(#[from] ConfigError),
}
