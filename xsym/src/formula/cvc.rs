//! Constraint text in the CVC presentation language.

use crate::error::XsymError;
use crate::formula::collect_inputs;
use crate::value::{BitRange, Node, OpTag, ValueArena, ValueId};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};

struct Emitter<'a> {
    arena: &'a ValueArena,
    suffix: &'static str,
}

impl Emitter<'_> {
    fn term(&self, id: ValueId) -> Result<String, XsymError> {
        let value = self.arena.get(id);
        let text = match value.node() {
            // narrow symbols only range over their own width
            Node::Symbol if value.width() < 32 => format!(
                "(sym{}{} & {})",
                id,
                self.suffix,
                constant(BitRange::low_bits(value.width()).mask())
            ),
            Node::Symbol => format!("sym{}{}", id, self.suffix),
            Node::Concrete(bits) => constant(bits.value()),
            Node::Hybrid(pieces) => {
                let parts = pieces
                    .iter()
                    .map(|(range, piece)| {
                        Ok(format!(
                            "(BVMULT(32, {}, {}) & {})",
                            self.term(*piece)?,
                            constant(1u32 << range.low),
                            constant(range.mask())
                        ))
                    })
                    .collect::<Result<Vec<_>, XsymError>>()?;
                format!("({})", parts.join(" | "))
            }
            Node::Computed { op, .. } => {
                let args = op
                    .operands()
                    .iter()
                    .map(|o| self.term(*o))
                    .collect::<Result<Vec<_>, XsymError>>()?;
                let count = || {
                    op.operands()
                        .get(1)
                        .and_then(|c| self.arena.known_value(*c))
                        .map(|k| k & 0x1f)
                };
                match (op.tag(), args.as_slice()) {
                    (OpTag::Add, [a, b]) => format!("BVPLUS(32, {}, {})", a, b),
                    (OpTag::Sub, [a, b]) => format!("BVSUB(32, {}, {})", a, b),
                    (OpTag::Imul, [a, b]) => format!("BVMULT(32, {}, {})", a, b),
                    (OpTag::Xor, [a, b]) => format!("BVXOR({}, {})", a, b),
                    (OpTag::And, [a, b]) => format!("({} & {})", a, b),
                    (OpTag::Or, [a, b]) => format!("({} | {})", a, b),
                    (OpTag::Shl, [a, b]) => match count() {
                        Some(k) => format!("(({} << {})[31:0])", a, k),
                        None => format!("BVSHL({}, {})", a, b),
                    },
                    (OpTag::Shr, [a, b]) => match count() {
                        Some(k) => format!("({} >> {})", a, k),
                        None => format!("BVLSHR({}, {})", a, b),
                    },
                    (OpTag::Neg, [a]) => format!("BVUMINUS({})", a),
                    (OpTag::Inc, [a]) => format!("BVPLUS(32, {}, {})", a, constant(1)),
                    (tag, _) => return Err(XsymError::UnknownOperation(tag.to_string())),
                }
            }
        };
        Ok(text)
    }
}

fn constant(v: u32) -> String {
    format!("0hex{:08x}", v)
}

/// The solver term for a single formula
pub fn dump(arena: &ValueArena, root: ValueId) -> Result<String, XsymError> {
    Emitter { arena, suffix: "" }.term(root)
}

/// A query asking whether two formulas can ever differ.
///
/// Symbols of the first formula are suffixed `a`, those of the second `b`. Each `(a, b)` pair
/// of raw symbol ids is asserted equal.
pub fn equivalence_query(
    first: (&ValueArena, ValueId),
    second: (&ValueArena, ValueId),
    pairs: &[(u32, u32)],
) -> Result<String, XsymError> {
    let a_syms = declared(first, pairs.iter().map(|p| p.0));
    let b_syms = declared(second, pairs.iter().map(|p| p.1));

    let mut out = String::new();
    for id in &a_syms {
        out += &format!("sym{}a: BV(32);\n", id);
    }
    for id in &b_syms {
        out += &format!("sym{}b: BV(32);\n", id);
    }
    out += "\n";
    for (a, b) in pairs {
        out += &format!("ASSERT(sym{}a = sym{}b);\n", a, b);
    }
    let lhs = Emitter {
        arena: first.0,
        suffix: "a",
    }
    .term(first.1)?;
    let rhs = Emitter {
        arena: second.0,
        suffix: "b",
    }
    .term(second.1)?;
    out += &format!("\nQUERY(\n{}\n=\n{});\nCOUNTEREXAMPLE;\n", lhs, rhs);
    Ok(out)
}

fn declared(
    formula: (&ValueArena, ValueId),
    paired: impl Iterator<Item = u32>,
) -> BTreeSet<u32> {
    collect_inputs(formula.0, formula.1)
        .into_iter()
        .map(|i| i.raw())
        .chain(paired)
        .collect()
}

/// One candidate correspondence between two formulas at bit granularity.
///
/// Input bit `32*i + j` is bit `j` of the `i`-th input symbol in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitMapping {
    /// First-formula input bit to second-formula input bit
    pub inputs: BTreeMap<usize, usize>,
    /// First-formula output bit to second-formula output bit
    pub outputs: BTreeMap<usize, usize>,
}

/// One query per mapping, each asking whether the mapped output bits can differ while the
/// mapped input bits agree
pub fn bit_sliced_queries(
    first: (&ValueArena, ValueId),
    second: (&ValueArena, ValueId),
    mappings: &[BitMapping],
) -> Result<Vec<String>, XsymError> {
    let inv1: Vec<ValueId> = collect_inputs(first.0, first.1).into_iter().collect();
    let inv2: Vec<ValueId> = collect_inputs(second.0, second.1).into_iter().collect();
    let out1 = Emitter {
        arena: first.0,
        suffix: "a",
    }
    .term(first.1)?;
    let out2 = Emitter {
        arena: second.0,
        suffix: "b",
    }
    .term(second.1)?;

    let mut queries = Vec::with_capacity(mappings.len());
    for mapping in mappings {
        let mut q = String::new();
        for i in 0..32 * inv1.len() {
            q += &format!("bit{}a: BV(1);\n", i);
        }
        for i in 0..32 * inv2.len() {
            q += &format!("bit{}b: BV(1);\n", i);
        }
        for (a, b) in &mapping.inputs {
            q += &format!("ASSERT(bit{}a = bit{}b);\n", a, b);
        }
        q += "\n\nQUERY(\n";
        q += &assemble(&inv1, "a");
        q += &assemble(&inv2, "b");
        q += &format!("LET out1 = {} IN (\n", out1);
        q += &format!("LET out2 = {} IN (\n", out2);
        if mapping.outputs.is_empty() {
            q += "TRUE\n";
        } else {
            q += &mapping
                .outputs
                .iter()
                .map(|(a, b)| format!("out1[{a}:{a}] = out2[{b}:{b}]"))
                .join(" AND\n");
            q += "\n";
        }
        q += &")".repeat(inv1.len() + inv2.len() + 3);
        q += ";\nCOUNTEREXAMPLE;";
        queries.push(q);
    }
    Ok(queries)
}

/// `LET` bindings rebuilding each input word from its bits, most significant bit first
fn assemble(inputs: &[ValueId], suffix: &str) -> String {
    inputs
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let bits = (0..32)
                .rev()
                .map(|j| format!("bit{}{}", i * 32 + j, suffix))
                .join("@");
            format!("LET sym{}{} = {} IN (\n", id, suffix, bits)
        })
        .collect()
}
