//! The symbolic value graph.
//!
//! Every value a trace produces lives in a [`ValueArena`] and is referred to by its
//! [`ValueId`]. Interior nodes point at their operands by id, so a value stored in several
//! registers or memory cells, or used by several operations, is one shared node.

mod arena;
mod opcode;

pub use arena::ValueArena;
pub use opcode::OpTag;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Identity of a value within its arena. Ids are handed out in construction order and never
/// reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(pub(crate) u32);

impl ValueId {
    pub fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for ValueId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An inclusive range of bit positions within a 32-bit word
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BitRange {
    pub low: u8,
    pub high: u8,
}

impl BitRange {
    pub const WORD: BitRange = BitRange { low: 0, high: 31 };

    pub fn new(low: u8, high: u8) -> Self {
        debug_assert!(low <= high && high < 32, "bad bit range [{low},{high}]");
        Self { low, high }
    }

    /// The range `[0, bits - 1]`
    pub fn low_bits(bits: u32) -> Self {
        Self::new(0, (bits.clamp(1, 32) - 1) as u8)
    }

    pub fn width(&self) -> u32 {
        (self.high - self.low) as u32 + 1
    }

    /// A word with exactly the bits of this range set
    pub fn mask(&self) -> u32 {
        let ones = match self.width() {
            32 => u32::MAX,
            w => (1u32 << w) - 1,
        };
        ones << self.low
    }
}

impl Display for BitRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.low, self.high)
    }
}

/// Known bits of a concrete value.
///
/// `word` is kept aligned to the full 32-bit word; `range` selects the bits this value covers.
/// The numeric value is those bits shifted down to position 0, and the hex text is derived
/// from it, so the two can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bits {
    word: u32,
    range: BitRange,
}

impl Bits {
    pub fn new(word: u32, range: BitRange) -> Self {
        Self { word, range }
    }

    pub fn word(&self) -> u32 {
        self.word
    }

    pub fn range(&self) -> BitRange {
        self.range
    }

    pub fn value(&self) -> u32 {
        (self.word & self.range.mask()) >> self.range.low
    }

    pub fn hex(&self) -> String {
        format!("{:#x}", self.value())
    }
}

/// Hybrid pieces, ordered by bit position
pub type Pieces = BTreeMap<BitRange, ValueId>;

/// An operation applied to one to three operand values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    tag: OpTag,
    operands: Vec<ValueId>,
}

impl Operation {
    pub fn tag(&self) -> OpTag {
        self.tag
    }

    pub fn operands(&self) -> &[ValueId] {
        &self.operands
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Symbol,
    Concrete,
    Hybrid,
}

/// What a value is made of. Each variant carries exactly the data its kind needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// An unconstrained trace input
    Symbol,
    /// A fully known constant
    Concrete(Bits),
    /// A word split into independently tracked pieces that partition bits 0 through 31
    Hybrid(Pieces),
    /// The result of an operation. `folded` holds the result when every operand was known.
    Computed {
        op: Operation,
        symbolic: bool,
        folded: Option<u32>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    id: ValueId,
    width: u32,
    node: Node,
}

impl Value {
    pub fn id(&self) -> ValueId {
        self.id
    }

    /// Width in bits of the logical value (8, 16 or 32)
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn kind(&self) -> ValueKind {
        match &self.node {
            Node::Symbol => ValueKind::Symbol,
            Node::Concrete(_) => ValueKind::Concrete,
            Node::Hybrid(_) => ValueKind::Hybrid,
            Node::Computed { symbolic: true, .. } => ValueKind::Symbol,
            Node::Computed { symbolic: false, .. } => ValueKind::Concrete,
        }
    }

    pub fn is_symbol(&self) -> bool {
        self.kind() == ValueKind::Symbol
    }

    pub fn is_concrete(&self) -> bool {
        self.kind() == ValueKind::Concrete
    }

    pub fn is_hybrid(&self) -> bool {
        self.kind() == ValueKind::Hybrid
    }

    /// A symbol with no defining operation: a trace input
    pub fn is_input(&self) -> bool {
        matches!(self.node, Node::Symbol)
    }

    pub fn operation(&self) -> Option<&Operation> {
        match &self.node {
            Node::Computed { op, .. } => Some(op),
            _ => None,
        }
    }

    pub fn pieces(&self) -> Option<&Pieces> {
        match &self.node {
            Node::Hybrid(pieces) => Some(pieces),
            _ => None,
        }
    }

    /// Known bits, for literal constants and for folded computations
    pub fn bits(&self) -> Option<Bits> {
        match &self.node {
            Node::Concrete(bits) => Some(*bits),
            Node::Computed {
                folded: Some(v), ..
            } => Some(Bits::new(*v, BitRange::WORD)),
            _ => None,
        }
    }
}
