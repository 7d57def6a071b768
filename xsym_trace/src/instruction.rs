use crate::error::TraceError;
use crate::operand::{AddressForm, MemoryOperand, Operand};
use crate::register::{Gpr, RegisterSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One executed instruction of a recorded trace, with every address it touched already
/// resolved by the tracer
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    /// Position of this instruction in the trace
    #[serde(default)]
    pub id: usize,
    /// The address this instruction was executed from
    pub address: u32,
    pub mnemonic: String,
    /// Zero to three parsed operands, destination first
    #[serde(default)]
    pub operands: Vec<Operand>,
    /// Register contents before this instruction executed
    #[serde(default)]
    pub context: RegisterSnapshot,
    /// The byte address this instruction read from memory, if any
    #[serde(default)]
    pub read_address: Option<u32>,
    /// The byte address this instruction wrote to memory, if any
    #[serde(default)]
    pub write_address: Option<u32>,
}

impl Instruction {
    pub fn new<S: Into<String>>(address: u32, mnemonic: S, operands: Vec<Operand>) -> Self {
        Self {
            id: 0,
            address,
            mnemonic: mnemonic.into(),
            operands,
            context: RegisterSnapshot::default(),
            read_address: None,
            write_address: None,
        }
    }

    pub fn with_context(mut self, context: RegisterSnapshot) -> Self {
        self.context = context;
        self
    }

    pub fn with_read(mut self, address: u32) -> Self {
        self.read_address = Some(address);
        self
    }

    pub fn with_write(mut self, address: u32) -> Self {
        self.write_address = Some(address);
        self
    }

    /// Compute the address a memory operand refers to from this instruction's register
    /// snapshot. Arithmetic wraps at 32 bits, as the hardware does.
    pub fn effective_address(&self, operand: &MemoryOperand) -> Result<u32, TraceError> {
        if let Some(seg) = &operand.segment {
            return Err(TraceError::SegmentOverride(seg.clone()));
        }
        let reg = |g: Gpr| self.context.get(g);
        let address = match operand.form {
            AddressForm::Absolute { address } => address,
            AddressForm::Base { base } => reg(base),
            AddressForm::Scaled { index, scale } => reg(index).wrapping_mul(scale),
            AddressForm::BaseDisp { base, disp } => disp.apply(reg(base)),
            AddressForm::BaseIndex { base, index, scale } => {
                reg(base).wrapping_add(reg(index).wrapping_mul(scale))
            }
            AddressForm::ScaledDisp { index, scale, disp } => {
                disp.apply(reg(index).wrapping_mul(scale))
            }
            AddressForm::Full {
                base,
                index,
                scale,
                disp,
            } => disp.apply(reg(base).wrapping_add(reg(index).wrapping_mul(scale))),
        };
        tracing::trace!("{} resolves to {:#x} at {:#x}", operand.form, address, self.address);
        Ok(address)
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}: {}", self.address, self.mnemonic)?;
        let args: Vec<String> = self.operands.iter().map(|o| o.to_string()).collect();
        if !args.is_empty() {
            write!(f, " {}", args.join(", "))?;
        }
        Ok(())
    }
}
