use crate::error::XsymError;
use crate::formula::{ArenaDisplayable, RenderStyle};
use crate::memory::AddrRange;
use crate::session::Session;
use crate::value::ValueId;
use std::fmt::{Display, Formatter};
use xsym_trace::Gpr;

/// The origin of an input symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLocation {
    Register(Gpr),
    Memory(AddrRange),
}

impl Display for InputLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InputLocation::Register(gpr) => write!(f, "{}", gpr),
            InputLocation::Memory(r) => write!(f, "[{:x}, {:x}]", r.start, r.end),
        }
    }
}

/// A rendered formula together with the origin of each of its inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaReport {
    pub value: ValueId,
    pub inputs: Vec<(ValueId, Option<InputLocation>)>,
    pub formula: String,
}

impl Display for FormulaReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} input symbols:", self.inputs.len())?;
        for (sym, location) in &self.inputs {
            match location {
                Some(l) => writeln!(f, "sym{}: {}", sym, l)?,
                None => writeln!(f, "sym{}:", sym)?,
            }
        }
        writeln!(f)?;
        writeln!(f, "sym{}=", self.value)?;
        write!(f, "{}", self.formula)
    }
}

impl Session {
    pub fn report(&self, value: ValueId, style: RenderStyle) -> FormulaReport {
        let inputs = self
            .inputs_of(value)
            .into_iter()
            .map(|sym| (sym, self.input_location(sym)))
            .collect();
        let formula = match style {
            RenderStyle::Plain => value.display(self.arena()).to_string(),
            RenderStyle::Debug => value.display_debug(self.arena()).to_string(),
        };
        FormulaReport {
            value,
            inputs,
            formula,
        }
    }

    /// Report on a register by any of its names
    pub fn register_report(
        &mut self,
        name: &str,
        style: RenderStyle,
    ) -> Result<FormulaReport, XsymError> {
        let value = self.read_register(name)?;
        Ok(self.report(value, style))
    }

    /// Report on the value stored at exactly `range`
    pub fn memory_report(&self, range: &AddrRange, style: RenderStyle) -> Option<FormulaReport> {
        self.memory_value(range).map(|v| self.report(v, style))
    }

    /// Every register's formula followed by the symbols it depends on
    pub fn register_dump(&self, style: RenderStyle) -> String {
        let mut out = String::new();
        for (gpr, value) in self.registers().iter() {
            out += &format!("{}: {}\n\n", gpr, self.report(value, style));
        }
        out
    }

    /// Every stored memory range and its formula
    pub fn memory_dump(&self, style: RenderStyle) -> String {
        let mut out = String::new();
        for (range, value) in self.memory().iter() {
            out += &format!(
                "[{:x},{:x}]: {}\n\n",
                range.start,
                range.end,
                self.report(*value, style)
            );
        }
        out
    }

    /// The symbols created for first reads of memory, with their byte ranges
    pub fn memory_inputs(&self) -> String {
        let mut out = String::from("Inputs in memory:\n");
        for (sym, range) in self.memory().inputs() {
            out += &format!("sym{}: {}\n", sym, InputLocation::Memory(*range));
        }
        out
    }
}
