use internment::Intern;
use std::fmt::{Display, Formatter};

/// The semantic tag of an [`Operation`](crate::value::Operation).
///
/// Mnemonics routed through the generic unary/binary transfer functions keep their name as the
/// tag. The ten tags with concrete semantics are the ones [`OpTag::apply`] folds; everything
/// else is carried along symbolically and rejected by the evaluator and the CVC emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpTag {
    Add,
    Sub,
    Imul,
    Xor,
    And,
    Or,
    Shl,
    Shr,
    Neg,
    Inc,
    Adc,
    Sbb,
    Dec,
    Not,
    Sar,
    Rol,
    Ror,
    Other(Intern<String>),
}

impl OpTag {
    pub fn from_mnemonic(mnemonic: &str) -> Self {
        match mnemonic {
            "add" => OpTag::Add,
            "sub" => OpTag::Sub,
            "imul" => OpTag::Imul,
            "xor" => OpTag::Xor,
            "and" => OpTag::And,
            "or" => OpTag::Or,
            "shl" | "sal" => OpTag::Shl,
            "shr" => OpTag::Shr,
            "neg" => OpTag::Neg,
            "inc" => OpTag::Inc,
            "adc" => OpTag::Adc,
            "sbb" => OpTag::Sbb,
            "dec" => OpTag::Dec,
            "not" => OpTag::Not,
            "sar" => OpTag::Sar,
            "rol" => OpTag::Rol,
            "ror" => OpTag::Ror,
            other => OpTag::Other(Intern::new(other.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            OpTag::Add => "add",
            OpTag::Sub => "sub",
            OpTag::Imul => "imul",
            OpTag::Xor => "xor",
            OpTag::And => "and",
            OpTag::Or => "or",
            OpTag::Shl => "shl",
            OpTag::Shr => "shr",
            OpTag::Neg => "neg",
            OpTag::Inc => "inc",
            OpTag::Adc => "adc",
            OpTag::Sbb => "sbb",
            OpTag::Dec => "dec",
            OpTag::Not => "not",
            OpTag::Sar => "sar",
            OpTag::Rol => "rol",
            OpTag::Ror => "ror",
            OpTag::Other(name) => name.as_str(),
        }
    }

    /// Concrete 32-bit semantics. Returns `None` for tags without a concrete rule or when the
    /// operand count does not fit the tag.
    ///
    /// Shift counts wrap modulo 32 like the hardware's 5-bit count mask.
    pub fn apply(&self, operands: &[u32]) -> Option<u32> {
        match (self, operands) {
            (OpTag::Add, [a, b]) => Some(a.wrapping_add(*b)),
            (OpTag::Sub, [a, b]) => Some(a.wrapping_sub(*b)),
            (OpTag::Imul, [a, b]) => Some(a.wrapping_mul(*b)),
            (OpTag::Xor, [a, b]) => Some(a ^ b),
            (OpTag::And, [a, b]) => Some(a & b),
            (OpTag::Or, [a, b]) => Some(a | b),
            (OpTag::Shl, [a, b]) => Some(a.wrapping_shl(*b)),
            (OpTag::Shr, [a, b]) => Some(a.wrapping_shr(*b)),
            (OpTag::Neg, [a]) => Some(a.wrapping_neg()),
            (OpTag::Inc, [a]) => Some(a.wrapping_add(1)),
            _ => None,
        }
    }
}

impl Display for OpTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
