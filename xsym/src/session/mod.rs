//! Replaying a trace against the symbolic machine state.

mod config;
mod report;
mod transfer;

#[cfg(test)]
mod tests;

pub use config::InterpreterConfig;
pub use report::{FormulaReport, InputLocation};

use crate::error::XsymError;
use crate::formula::{self, Bindings};
use crate::memory::{AddrRange, Memory};
use crate::registers::RegisterFile;
use crate::value::{ValueArena, ValueId};
use std::collections::BTreeSet;
use tracing::{debug, error, instrument};
use xsym_trace::{Gpr, Instruction, RegisterSnapshot};

/// One analysis run: the value arena, the machine state built from it, and the settings that
/// drive interpretation.
///
/// Sessions share nothing, so independent traces can be analysed side by side.
#[derive(Debug, Clone)]
pub struct Session {
    config: InterpreterConfig,
    arena: ValueArena,
    registers: RegisterFile,
    memory: Memory,
    executed: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session whose eight registers hold fresh entry symbols
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        let mut session = Self::empty(config);
        for gpr in Gpr::ALL {
            session.registers.seed(&mut session.arena, gpr);
        }
        session
    }

    /// A session whose registers start out holding the given concrete values
    pub fn with_initial_values(config: InterpreterConfig, initial: RegisterSnapshot) -> Self {
        let mut session = Self::empty(config);
        for gpr in Gpr::ALL {
            let v = session.arena.concrete(initial.get(gpr));
            session.registers.set(gpr, v);
        }
        session
    }

    /// A session with empty registers. Every register must be seeded before it is read.
    pub fn empty(config: InterpreterConfig) -> Self {
        Self {
            config,
            arena: ValueArena::new(),
            registers: RegisterFile::new(),
            memory: Memory::new(),
            executed: 0,
        }
    }

    pub fn seed_register(&mut self, gpr: Gpr) -> ValueId {
        self.registers.seed(&mut self.arena, gpr)
    }

    pub fn set_register(&mut self, gpr: Gpr, value: ValueId) {
        self.registers.set(gpr, value);
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn arena(&self) -> &ValueArena {
        &self.arena
    }

    /// For building values to place in registers or bind against
    pub fn arena_mut(&mut self) -> &mut ValueArena {
        &mut self.arena
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Number of instructions that have been applied so far
    pub fn executed(&self) -> usize {
        self.executed
    }

    pub fn register(&self, gpr: Gpr) -> Option<ValueId> {
        self.registers.get(gpr)
    }

    /// Read any register name, sub-registers included
    pub fn read_register(&mut self, name: &str) -> Result<ValueId, XsymError> {
        self.registers.read(&mut self.arena, name)
    }

    pub fn memory_value(&self, range: &AddrRange) -> Option<ValueId> {
        self.memory.get(range)
    }

    /// Replay a whole trace, stopping at the first instruction that cannot be modeled
    pub fn run<'a, I: IntoIterator<Item = &'a Instruction>>(
        &mut self,
        trace: I,
    ) -> Result<(), XsymError> {
        for (index, insn) in trace.into_iter().enumerate() {
            self.step(insn).map_err(|e| {
                error!("aborting at instruction {} ({}): {}", index, insn, e);
                XsymError::AtInstruction {
                    index,
                    address: insn.address,
                    mnemonic: insn.mnemonic.clone(),
                    source: Box::new(e),
                }
            })?;
        }
        Ok(())
    }

    /// Apply a single instruction. On error the machine state is as it was before the call.
    #[instrument(skip_all, fields(address = insn.address, mnemonic = %insn.mnemonic))]
    pub fn step(&mut self, insn: &Instruction) -> Result<(), XsymError> {
        if self.config.skips(&insn.mnemonic) {
            debug!("skipping {}", insn);
            return Ok(());
        }
        debug!("interpreting {}", insn);
        transfer::apply(self, insn)?;
        self.executed += 1;
        Ok(())
    }

    /// Every register and memory value produced by an operation, registers first
    pub fn outputs(&self) -> Vec<ValueId> {
        let regs = self.registers.iter().map(|(_, v)| v);
        let mem = self.memory.iter().map(|(_, v)| *v);
        regs.chain(mem)
            .filter(|v| self.arena.get(*v).operation().is_some())
            .collect()
    }

    /// Where an input symbol came from, if it is one this session created
    pub fn input_location(&self, value: ValueId) -> Option<InputLocation> {
        if let Some(gpr) = self.registers.inputs().get(&value) {
            return Some(InputLocation::Register(*gpr));
        }
        self.memory
            .inputs()
            .get(&value)
            .map(|r| InputLocation::Memory(*r))
    }

    pub fn inputs_of(&self, value: ValueId) -> BTreeSet<ValueId> {
        formula::collect_inputs(&self.arena, value)
    }

    /// Pair `value`'s inputs, in id order, with `values`
    pub fn bindings(&self, value: ValueId, values: &[u32]) -> Result<Bindings, XsymError> {
        formula::bindings(&self.inputs_of(value), values)
    }

    pub fn evaluate(&self, value: ValueId, bindings: &Bindings) -> Result<u32, XsymError> {
        formula::evaluate(&self.arena, value, bindings)
    }
}
