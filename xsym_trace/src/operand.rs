use crate::error::TraceError;
use crate::register::{Gpr, RegisterView};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Parse a `0x`-prefixed hexadecimal literal as it appears in trace text
pub fn parse_hex(s: &str) -> Result<u32, TraceError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| TraceError::InvalidHex(s.to_string()))?;
    u32::from_str_radix(digits, 16).map_err(|_| TraceError::InvalidHex(s.to_string()))
}

/// A signed displacement, kept as the sign and magnitude the disassembler printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Displacement {
    Plus(u32),
    Minus(u32),
}

impl Displacement {
    pub fn apply(&self, base: u32) -> u32 {
        match self {
            Displacement::Plus(c) => base.wrapping_add(*c),
            Displacement::Minus(c) => base.wrapping_sub(*c),
        }
    }
}

impl Display for Displacement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Displacement::Plus(c) => write!(f, "+{:#x}", c),
            Displacement::Minus(c) => write!(f, "-{:#x}", c),
        }
    }
}

/// The shape of the address computation inside `[...]`.
///
/// Each shape carries the tag number the trace tooling has always used for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressForm {
    /// tag 1: `[0x1234]`
    Absolute { address: u32 },
    /// tag 2: `[eax]`
    Base { base: Gpr },
    /// tag 3: `[eax*4]`
    Scaled { index: Gpr, scale: u32 },
    /// tag 4: `[eax+0x10]`
    BaseDisp { base: Gpr, disp: Displacement },
    /// tag 5: `[eax+ebx*2]`
    BaseIndex { base: Gpr, index: Gpr, scale: u32 },
    /// tag 6: `[ebx*2+0x10]`
    ScaledDisp {
        index: Gpr,
        scale: u32,
        disp: Displacement,
    },
    /// tag 7: `[eax+ebx*2+0x10]`
    Full {
        base: Gpr,
        index: Gpr,
        scale: u32,
        disp: Displacement,
    },
}

impl AddressForm {
    pub fn tag(&self) -> u8 {
        match self {
            AddressForm::Absolute { .. } => 1,
            AddressForm::Base { .. } => 2,
            AddressForm::Scaled { .. } => 3,
            AddressForm::BaseDisp { .. } => 4,
            AddressForm::BaseIndex { .. } => 5,
            AddressForm::ScaledDisp { .. } => 6,
            AddressForm::Full { .. } => 7,
        }
    }
}

impl Display for AddressForm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressForm::Absolute { address } => write!(f, "{:#x}", address),
            AddressForm::Base { base } => write!(f, "{}", base),
            AddressForm::Scaled { index, scale } => write!(f, "{}*{}", index, scale),
            AddressForm::BaseDisp { base, disp } => write!(f, "{}{}", base, disp),
            AddressForm::BaseIndex { base, index, scale } => {
                write!(f, "{}+{}*{}", base, index, scale)
            }
            AddressForm::ScaledDisp { index, scale, disp } => {
                write!(f, "{}*{}{}", index, scale, disp)
            }
            AddressForm::Full {
                base,
                index,
                scale,
                disp,
            } => write!(f, "{}+{}*{}{}", base, index, scale, disp),
        }
    }
}

/// A `[...]` operand together with the width of the access
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryOperand {
    pub form: AddressForm,
    /// Segment register for `fs:[...]`-style accesses
    #[serde(default)]
    pub segment: Option<String>,
    pub bits: u32,
}

impl MemoryOperand {
    pub fn new(form: AddressForm, bits: u32) -> Result<Self, TraceError> {
        check_width(bits)?;
        Ok(Self {
            form,
            segment: None,
            bits,
        })
    }

    pub fn byte_count(&self) -> u32 {
        self.bits / 8
    }
}

/// A typed instruction operand
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operand {
    Immediate(u32),
    Register { name: String, bits: u32 },
    Memory(MemoryOperand),
}

impl Operand {
    /// Build an immediate from its trace text
    pub fn immediate(text: &str) -> Result<Self, TraceError> {
        Ok(Operand::Immediate(parse_hex(text)?))
    }

    /// Build a register operand, deriving its width from the register name
    pub fn register(name: &str) -> Result<Self, TraceError> {
        let view: RegisterView = name.parse()?;
        Ok(Operand::Register {
            name: name.to_string(),
            bits: view.bits(),
        })
    }

    pub fn memory(form: AddressForm, bits: u32) -> Result<Self, TraceError> {
        Ok(Operand::Memory(MemoryOperand::new(form, bits)?))
    }

    /// The width of the data this operand names. Immediates are treated as full words.
    pub fn bits(&self) -> u32 {
        match self {
            Operand::Immediate(_) => 32,
            Operand::Register { bits, .. } => *bits,
            Operand::Memory(m) => m.bits,
        }
    }

    pub fn byte_count(&self) -> u32 {
        self.bits() / 8
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self, Operand::Immediate(_))
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Immediate(v) => write!(f, "{:#x}", v),
            Operand::Register { name, .. } => f.write_str(name),
            Operand::Memory(m) => {
                let size = match m.bits {
                    8 => "byte",
                    16 => "word",
                    _ => "dword",
                };
                match &m.segment {
                    Some(seg) => write!(f, "{} ptr {}:[{}]", size, seg, m.form),
                    None => write!(f, "{} ptr [{}]", size, m.form),
                }
            }
        }
    }
}

fn check_width(bits: u32) -> Result<(), TraceError> {
    match bits {
        8 | 16 | 32 => Ok(()),
        _ => Err(TraceError::InvalidWidth(bits)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_literals() {
        assert_eq!(parse_hex("0x5"), Ok(5));
        assert_eq!(parse_hex("0xffffff00"), Ok(0xffff_ff00));
        assert_eq!(parse_hex("12"), Err(TraceError::InvalidHex("12".to_string())));
        assert!(parse_hex("0xzz").is_err());
    }

    #[test]
    fn register_width_from_name() {
        assert_eq!(
            Operand::register("dx").unwrap(),
            Operand::Register {
                name: "dx".to_string(),
                bits: 16
            }
        );
        assert!(Operand::register("xmm0").is_err());
    }

    #[test]
    fn memory_display() {
        let op = Operand::memory(
            AddressForm::Full {
                base: Gpr::Eax,
                index: Gpr::Ebx,
                scale: 2,
                disp: Displacement::Minus(0x10),
            },
            8,
        )
        .unwrap();
        assert_eq!(op.to_string(), "byte ptr [eax+ebx*2-0x10]");
        assert!(Operand::memory(AddressForm::Base { base: Gpr::Esp }, 12).is_err());
    }
}
