//! Reading formulas back out of the value graph: rendering, free-symbol collection, concrete
//! evaluation and solver input text.

mod cvc;
mod eval;

pub use cvc::{BitMapping, bit_sliced_queries, dump, equivalence_query};
pub use eval::{Bindings, bindings, evaluate};

use crate::value::{Node, ValueArena, ValueId};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt::{Display, Formatter};

/// How hybrid words are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderStyle {
    /// Hybrids appear as an opaque `hyb<id>` leaf
    #[default]
    Plain,
    /// Hybrids list every piece as `[lo,hi]:piece`
    Debug,
}

pub trait ArenaDisplayable: Sized + Copy {
    fn fmt_arena(
        &self,
        f: &mut Formatter<'_>,
        arena: &ValueArena,
        style: RenderStyle,
    ) -> std::fmt::Result;

    fn display(self, arena: &ValueArena) -> ArenaDisplay<'_, Self> {
        ArenaDisplay {
            arena,
            inner: self,
            style: RenderStyle::Plain,
        }
    }

    fn display_debug(self, arena: &ValueArena) -> ArenaDisplay<'_, Self> {
        ArenaDisplay {
            arena,
            inner: self,
            style: RenderStyle::Debug,
        }
    }
}

pub struct ArenaDisplay<'a, T> {
    arena: &'a ValueArena,
    inner: T,
    style: RenderStyle,
}

impl<T: ArenaDisplayable> Display for ArenaDisplay<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt_arena(f, self.arena, self.style)
    }
}

impl ArenaDisplayable for ValueId {
    fn fmt_arena(
        &self,
        f: &mut Formatter<'_>,
        arena: &ValueArena,
        style: RenderStyle,
    ) -> std::fmt::Result {
        match arena.get(*self).node() {
            Node::Symbol => write!(f, "sym{}", self),
            Node::Concrete(bits) => write!(f, "{}", bits.hex()),
            Node::Hybrid(pieces) => match style {
                RenderStyle::Plain => write!(f, "hyb{}", self),
                RenderStyle::Debug => {
                    write!(f, "[hyb{}", self)?;
                    for (range, piece) in pieces {
                        write!(f, " {}:", range)?;
                        piece.fmt_arena(f, arena, style)?;
                    }
                    write!(f, "]")
                }
            },
            Node::Computed { op, .. } => {
                write!(f, "({}", op.tag())?;
                for operand in op.operands() {
                    write!(f, " ")?;
                    operand.fmt_arena(f, arena, style)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Every input symbol reachable from `root`, hybrid pieces included.
///
/// The walk is breadth-first over an explicit queue so deep graphs do not exhaust the stack.
pub fn collect_inputs(arena: &ValueArena, root: ValueId) -> BTreeSet<ValueId> {
    let mut inputs = BTreeSet::new();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([root]);
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        match arena.get(id).node() {
            Node::Symbol => {
                inputs.insert(id);
            }
            Node::Concrete(_) => {}
            Node::Hybrid(pieces) => queue.extend(pieces.values().copied()),
            Node::Computed { op, .. } => queue.extend(op.operands().iter().copied()),
        }
    }
    inputs
}
