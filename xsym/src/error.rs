use crate::memory::AddrRange;
use thiserror::Error;
use xsym_trace::{Gpr, TraceError};

#[derive(Debug, Error)]
pub enum XsymError {
    #[error("Malformed trace record")]
    Trace(#[from] TraceError),
    #[error("Unknown register name `{0}`")]
    UnknownRegister(String),
    #[error("Register {0} was read before it held a value")]
    UnseededRegister(Gpr),
    #[error("xsym does not model `{mnemonic}` with operands ({shape})")]
    UnsupportedShape { mnemonic: String, shape: String },
    #[error("lea is only modeled for base+index*scale addresses, not address tag {0}")]
    UnsupportedAddressForm(u8),
    #[error("`{mnemonic}` needs a {access} address that the trace does not record")]
    MissingAddress {
        mnemonic: String,
        access: &'static str,
    },
    #[error("Access to {access} partially overlaps the stored range {stored}")]
    PartialOverlap { access: AddrRange, stored: AddrRange },
    #[error("A {bytes}-byte access at {address:#x} runs past the end of the address space")]
    AddressWrap { address: u32, bytes: u32 },
    #[error("Stored range {0} is wider than a machine word")]
    OversizedRange(AddrRange),
    #[error("Hybrid pieces must partition bits 0 through 31 without gaps or overlaps")]
    BrokenPartition,
    #[error("No concrete or solver semantics for `{0}`")]
    UnknownOperation(String),
    #[error("Bindings do not match the formula's inputs ({missing} unbound, {unexpected} unexpected)")]
    BindingMismatch { missing: usize, unexpected: usize },
    #[error("Got {values} values for {inputs} input symbols")]
    BindingArity { inputs: usize, values: usize },
    #[error("Instruction {index} ({address:#x} {mnemonic}) failed")]
    AtInstruction {
        index: usize,
        address: u32,
        mnemonic: String,
        #[source]
        source: Box<XsymError>,
    },
}

impl XsymError {
    /// Strip any instruction context and return the underlying cause
    pub fn root_cause(&self) -> &XsymError {
        match self {
            XsymError::AtInstruction { source, .. } => source.root_cause(),
            e => e,
        }
    }
}
