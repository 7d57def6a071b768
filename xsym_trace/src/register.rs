use crate::error::TraceError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// One of the eight 32-bit general-purpose registers.
///
/// The discriminants follow the order in which trace snapshots record register contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gpr {
    Eax = 0,
    Ebx = 1,
    Ecx = 2,
    Edx = 3,
    Esi = 4,
    Edi = 5,
    Esp = 6,
    Ebp = 7,
}

impl Gpr {
    pub const ALL: [Gpr; 8] = [
        Gpr::Eax,
        Gpr::Ebx,
        Gpr::Ecx,
        Gpr::Edx,
        Gpr::Esi,
        Gpr::Edi,
        Gpr::Esp,
        Gpr::Ebp,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Gpr::Eax => "eax",
            Gpr::Ebx => "ebx",
            Gpr::Ecx => "ecx",
            Gpr::Edx => "edx",
            Gpr::Esi => "esi",
            Gpr::Edi => "edi",
            Gpr::Esp => "esp",
            Gpr::Ebp => "ebp",
        }
    }
}

impl Display for Gpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Gpr {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match RegisterView::from_str(s)? {
            RegisterView::Full(gpr) => Ok(gpr),
            _ => Err(TraceError::UnknownRegister(s.to_string())),
        }
    }
}

/// A register name as it appears in an operand: either a whole 32-bit register or one of the
/// narrower views that alias its low bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterView {
    /// `eax`, `ebx`, ...
    Full(Gpr),
    /// `ax`, `bx`, ..., `sp`, `bp`: bits 0 through 15
    Low16(Gpr),
    /// `al`, `bl`, `cl`, `dl`: bits 0 through 7
    Low8(Gpr),
    /// `ah`, `bh`, `ch`, `dh`: bits 8 through 15
    High8(Gpr),
}

impl RegisterView {
    pub fn owner(&self) -> Gpr {
        match self {
            RegisterView::Full(g)
            | RegisterView::Low16(g)
            | RegisterView::Low8(g)
            | RegisterView::High8(g) => *g,
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            RegisterView::Full(_) => 32,
            RegisterView::Low16(_) => 16,
            RegisterView::Low8(_) | RegisterView::High8(_) => 8,
        }
    }

    /// The inclusive `(low, high)` bit positions this view occupies within its owner
    pub fn bit_span(&self) -> (u8, u8) {
        match self {
            RegisterView::Full(_) => (0, 31),
            RegisterView::Low16(_) => (0, 15),
            RegisterView::Low8(_) => (0, 7),
            RegisterView::High8(_) => (8, 15),
        }
    }
}

impl FromStr for RegisterView {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Gpr::*;
        let view = match s {
            "eax" => RegisterView::Full(Eax),
            "ebx" => RegisterView::Full(Ebx),
            "ecx" => RegisterView::Full(Ecx),
            "edx" => RegisterView::Full(Edx),
            "esi" => RegisterView::Full(Esi),
            "edi" => RegisterView::Full(Edi),
            "esp" => RegisterView::Full(Esp),
            "ebp" => RegisterView::Full(Ebp),
            "ax" => RegisterView::Low16(Eax),
            "bx" => RegisterView::Low16(Ebx),
            "cx" => RegisterView::Low16(Ecx),
            "dx" => RegisterView::Low16(Edx),
            "si" => RegisterView::Low16(Esi),
            "di" => RegisterView::Low16(Edi),
            "sp" => RegisterView::Low16(Esp),
            "bp" => RegisterView::Low16(Ebp),
            "al" => RegisterView::Low8(Eax),
            "bl" => RegisterView::Low8(Ebx),
            "cl" => RegisterView::Low8(Ecx),
            "dl" => RegisterView::Low8(Edx),
            "ah" => RegisterView::High8(Eax),
            "bh" => RegisterView::High8(Ebx),
            "ch" => RegisterView::High8(Ecx),
            "dh" => RegisterView::High8(Edx),
            _ => return Err(TraceError::UnknownRegister(s.to_string())),
        };
        Ok(view)
    }
}

impl Display for RegisterView {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let full = self.owner().name();
        match self {
            RegisterView::Full(_) => f.write_str(full),
            RegisterView::Low16(_) => f.write_str(&full[1..]),
            RegisterView::Low8(_) => write!(f, "{}l", &full[1..2]),
            RegisterView::High8(_) => write!(f, "{}h", &full[1..2]),
        }
    }
}

/// The concrete contents of the general-purpose registers immediately before an instruction
/// executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterSnapshot(pub [u32; 8]);

impl RegisterSnapshot {
    pub fn get(&self, gpr: Gpr) -> u32 {
        self.0[gpr.index()]
    }

    pub fn set(&mut self, gpr: Gpr, value: u32) {
        self.0[gpr.index()] = value;
    }
}
