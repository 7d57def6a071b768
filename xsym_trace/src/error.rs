use thiserror::Error;

/// An error in a trace record: something the record producer handed us that does not describe
/// a 32-bit x86 operand we know how to interpret
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TraceError {
    /// A register name outside of the eight general-purpose registers and their
    /// 16-bit/8-bit views
    #[error("unknown register name `{0}`")]
    UnknownRegister(String),
    /// An immediate or displacement that is not a `0x`-prefixed hexadecimal literal
    #[error("`{0}` is not a hexadecimal literal")]
    InvalidHex(String),
    /// Operand widths are always 8, 16 or 32 bits in a 32-bit trace
    #[error("unsupported operand width of {0} bits")]
    InvalidWidth(u32),
    /// Segment-relative addresses (`fs:[...]`) depend on a segment base the trace does not record
    #[error("cannot compute a `{0}:`-relative address from a register snapshot")]
    SegmentOverride(String),
}
