use crate::error::XsymError;
use crate::formula::collect_inputs;
use crate::value::{BitRange, Node, ValueArena, ValueId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Concrete values for a formula's input symbols
pub type Bindings = BTreeMap<ValueId, u32>;

/// Pair input symbols with values in order
pub fn bindings(inputs: &BTreeSet<ValueId>, values: &[u32]) -> Result<Bindings, XsymError> {
    if inputs.len() != values.len() {
        return Err(XsymError::BindingArity {
            inputs: inputs.len(),
            values: values.len(),
        });
    }
    Ok(inputs.iter().copied().zip(values.iter().copied()).collect())
}

/// Compute the 32-bit result of `root` under `bindings`.
///
/// The bound symbols must be exactly the formula's inputs. A binding wider than its symbol is
/// truncated to the symbol's width.
pub fn evaluate(arena: &ValueArena, root: ValueId, bindings: &Bindings) -> Result<u32, XsymError> {
    let inputs = collect_inputs(arena, root);
    let missing = inputs.iter().filter(|i| !bindings.contains_key(i)).count();
    let unexpected = bindings.keys().filter(|k| !inputs.contains(k)).count();
    if missing + unexpected > 0 {
        return Err(XsymError::BindingMismatch {
            missing,
            unexpected,
        });
    }
    let mut memo = HashMap::new();
    eval(arena, root, bindings, &mut memo)
}

fn eval(
    arena: &ValueArena,
    id: ValueId,
    bindings: &Bindings,
    memo: &mut HashMap<ValueId, u32>,
) -> Result<u32, XsymError> {
    if let Some(v) = memo.get(&id) {
        return Ok(*v);
    }
    let value = arena.get(id);
    let result = match value.node() {
        Node::Symbol => {
            let bound = bindings.get(&id).copied().ok_or(XsymError::BindingMismatch {
                missing: 1,
                unexpected: 0,
            })?;
            bound & BitRange::low_bits(value.width()).mask()
        }
        Node::Concrete(bits) => bits.value(),
        Node::Hybrid(pieces) => {
            let mut word = 0;
            for (range, piece) in pieces {
                let v = eval(arena, *piece, bindings, memo)?;
                word |= v.wrapping_shl(range.low as u32) & range.mask();
            }
            word
        }
        Node::Computed { op, .. } => {
            let mut args = Vec::with_capacity(op.operands().len());
            for operand in op.operands() {
                args.push(eval(arena, *operand, bindings, memo)?);
            }
            op.tag()
                .apply(&args)
                .ok_or_else(|| XsymError::UnknownOperation(op.tag().to_string()))?
        }
    };
    memo.insert(id, result);
    Ok(result)
}
