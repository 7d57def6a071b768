use crate::error::XsymError;
use crate::value::{BitRange, Bits, Node, OpTag, Operation, Pieces, Value, ValueId};
use itertools::Itertools;
use xsym_trace::parse_hex;

/// Owns every value built during one analysis run
#[derive(Debug, Clone, Default)]
pub struct ValueArena {
    values: Vec<Value>,
}

impl ValueArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a value. Ids are only ever minted by this arena.
    pub fn get(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    fn push(&mut self, width: u32, node: Node) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(Value { id, width, node });
        id
    }

    /// A fresh unconstrained input of the given width
    pub fn symbol(&mut self, width: u32) -> ValueId {
        self.push(width, Node::Symbol)
    }

    /// A full-word constant
    pub fn concrete(&mut self, value: u32) -> ValueId {
        self.concrete_sized(value, 32)
    }

    /// A constant narrowed to its low `width` bits
    pub fn concrete_sized(&mut self, value: u32, width: u32) -> ValueId {
        let range = BitRange::low_bits(width);
        self.push(width, Node::Concrete(Bits::new(value, range)))
    }

    /// A constant occupying `bits.range()` of a word, as used for hybrid pieces
    pub fn concrete_bits(&mut self, bits: Bits) -> ValueId {
        self.push(bits.range().width(), Node::Concrete(bits))
    }

    /// A full-word constant from its `0x...` trace text
    pub fn hex(&mut self, text: &str) -> Result<ValueId, XsymError> {
        Ok(self.concrete(parse_hex(text)?))
    }

    /// A hybrid word. The pieces must partition bits 0 through 31.
    pub fn hybrid(&mut self, pieces: Pieces) -> Result<ValueId, XsymError> {
        if !is_partition(&pieces) {
            return Err(XsymError::BrokenPartition);
        }
        Ok(self.push(32, Node::Hybrid(pieces)))
    }

    pub fn unary(&mut self, tag: OpTag, a: ValueId) -> ValueId {
        let width = self.get(a).width;
        self.build(tag, vec![a], width)
    }

    pub fn binary(&mut self, tag: OpTag, a: ValueId, b: ValueId) -> ValueId {
        let width = self.get(a).width;
        self.build(tag, vec![a, b], width)
    }

    /// No transfer function produces three-operand operations yet; kept so the graph can
    /// represent them.
    pub fn ternary(&mut self, tag: OpTag, a: ValueId, b: ValueId, c: ValueId) -> ValueId {
        let width = self.get(a).width;
        self.build(tag, vec![a, b, c], width)
    }

    /// Build an operation whose logical width differs from its first operand's, such as a
    /// sub-register or sub-range extraction
    pub fn binary_sized(&mut self, tag: OpTag, a: ValueId, b: ValueId, width: u32) -> ValueId {
        self.build(tag, vec![a, b], width)
    }

    fn build(&mut self, tag: OpTag, operands: Vec<ValueId>, width: u32) -> ValueId {
        let symbolic = operands.iter().any(|o| self.is_symbolic(*o));
        let folded = if symbolic {
            None
        } else {
            operands
                .iter()
                .map(|o| self.known_value(*o))
                .collect::<Option<Vec<u32>>>()
                .and_then(|vals| tag.apply(&vals))
        };
        let op = Operation { tag, operands };
        self.push(
            width,
            Node::Computed {
                op,
                symbolic,
                folded,
            },
        )
    }

    /// Whether the value depends on any trace input. Hybrids are symbolic when any of
    /// their pieces is.
    pub fn is_symbolic(&self, id: ValueId) -> bool {
        match &self.get(id).node {
            Node::Symbol => true,
            Node::Concrete(_) => false,
            Node::Computed { symbolic, .. } => *symbolic,
            Node::Hybrid(pieces) => pieces.values().any(|p| self.is_symbolic(*p)),
        }
    }

    /// The concrete value, when it is known without any input bindings
    pub fn known_value(&self, id: ValueId) -> Option<u32> {
        match &self.get(id).node {
            Node::Symbol => None,
            Node::Concrete(bits) => Some(bits.value()),
            Node::Computed { folded, .. } => *folded,
            Node::Hybrid(pieces) => pieces.iter().try_fold(0u32, |acc, (range, piece)| {
                Some(acc | place(*range, self.known_value(*piece)?))
            }),
        }
    }

    /// Shift every piece of a hybrid word by an immediate count, keeping exact bit-range
    /// bookkeeping instead of wrapping the word in an opaque shift.
    ///
    /// Concrete pieces have their bits shifted; pieces that leave the word are dropped and the
    /// vacated end is filled with a zero piece. A symbolic piece whose low bits fall off the
    /// bottom of the word is wrapped in a `shr` by the number of lost bits.
    pub fn shift_hybrid(
        &mut self,
        id: ValueId,
        tag: OpTag,
        count: u32,
    ) -> Result<ValueId, XsymError> {
        let pieces = match self.get(id).pieces() {
            Some(p) => p.clone(),
            None => return Err(XsymError::BrokenPartition),
        };
        let n = (count & 0x1f) as u8;
        if n == 0 {
            return self.hybrid(pieces);
        }
        let left = match tag {
            OpTag::Shl => true,
            OpTag::Shr => false,
            other => return Err(XsymError::UnknownOperation(other.to_string())),
        };
        let mut shifted = Pieces::new();
        for (range, piece) in pieces {
            let new_range = if left {
                if range.low + n > 31 {
                    continue;
                }
                BitRange::new(range.low + n, (range.high + n).min(31))
            } else {
                if range.high < n {
                    continue;
                }
                BitRange::new(range.low.saturating_sub(n), range.high - n)
            };
            let known = match self.get(piece).node() {
                Node::Concrete(bits) => Some(*bits),
                _ => None,
            };
            let moved = match known {
                Some(bits) => {
                    let word = if left {
                        bits.word() << n
                    } else {
                        bits.word() >> n
                    };
                    self.concrete_bits(Bits::new(word, new_range))
                }
                _ if !left && range.low < n => {
                    let lost = self.concrete((n - range.low) as u32);
                    self.binary(OpTag::Shr, piece, lost)
                }
                _ => piece,
            };
            shifted.insert(new_range, moved);
        }
        let vacated = if left {
            BitRange::new(0, n - 1)
        } else {
            BitRange::new(32 - n, 31)
        };
        let zero = self.concrete_bits(Bits::new(0, vacated));
        shifted.insert(vacated, zero);
        tracing::trace!(
            "shifted hybrid {} by {}: {}",
            id,
            n,
            shifted.keys().join(" ")
        );
        self.hybrid(shifted)
    }

    /// Fold `and`/`or` with an immediate mask over a hybrid word when the mask forces every
    /// symbolic bit to a known outcome: zeros for `and`, ones for `or`.
    ///
    /// Returns `None` when some symbolic bit survives the mask, or the value is not hybrid.
    pub fn fold_mask(&mut self, id: ValueId, tag: OpTag, mask: u32) -> Option<ValueId> {
        let pieces = self.get(id).pieces()?.clone();
        let mut word = 0u32;
        for (range, piece) in &pieces {
            let bits = if self.is_symbolic(*piece) {
                match tag {
                    OpTag::And if mask & range.mask() == 0 => 0,
                    OpTag::Or if mask & range.mask() == range.mask() => range.mask(),
                    _ => return None,
                }
            } else {
                let known = place(*range, self.known_value(*piece)?);
                match tag {
                    OpTag::And => known & mask,
                    OpTag::Or => (known | mask) & range.mask(),
                    _ => return None,
                }
            };
            word |= bits;
        }
        Some(self.concrete(word))
    }
}

/// Position a piece's value in its range of the word
pub(crate) fn place(range: BitRange, value: u32) -> u32 {
    value.wrapping_shl(range.low as u32) & range.mask()
}

fn is_partition(pieces: &Pieces) -> bool {
    let mut next = 0u32;
    for range in pieces.keys() {
        if range.low as u32 != next || range.high < range.low {
            return false;
        }
        next = range.high as u32 + 1;
    }
    next == 32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;

    fn split_word(arena: &mut ValueArena, word: u32) -> (ValueId, ValueId) {
        let sym = arena.symbol(8);
        let low = arena.concrete_bits(Bits::new(word, BitRange::new(0, 7)));
        let high = arena.concrete_bits(Bits::new(word, BitRange::new(16, 31)));
        let pieces = Pieces::from([
            (BitRange::new(0, 7), low),
            (BitRange::new(8, 15), sym),
            (BitRange::new(16, 31), high),
        ]);
        (arena.hybrid(pieces).unwrap(), sym)
    }

    #[test]
    fn ids_are_sequential() {
        let mut arena = ValueArena::new();
        let a = arena.symbol(32);
        let b = arena.concrete(1);
        let c = arena.binary(OpTag::Add, a, b);
        assert_eq!((a.raw(), b.raw(), c.raw()), (0, 1, 2));
        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn kind_follows_operands() {
        let mut arena = ValueArena::new();
        let s = arena.symbol(32);
        let five = arena.concrete(5);
        let three = arena.hex("0x3").unwrap();
        let sum = arena.binary(OpTag::Add, five, three);
        assert_eq!(arena.get(sum).kind(), ValueKind::Concrete);
        assert_eq!(arena.known_value(sum), Some(8));
        let mixed = arena.binary(OpTag::Add, sum, s);
        assert!(arena.get(mixed).is_symbol());
        assert!(!arena.get(mixed).is_input());
        assert_eq!(arena.known_value(mixed), None);
        let neg = arena.unary(OpTag::Neg, five);
        assert_eq!(arena.known_value(neg), Some(5u32.wrapping_neg()));
    }

    #[test]
    fn builders_do_not_touch_operands() {
        let mut arena = ValueArena::new();
        let s = arena.symbol(32);
        let before = arena.get(s).clone();
        let _ = arena.binary(OpTag::Xor, s, s);
        assert_eq!(arena.get(s), &before);
    }

    #[test]
    fn unfoldable_concrete_stays_concrete() {
        let mut arena = ValueArena::new();
        let one = arena.concrete(1);
        let dec = arena.unary(OpTag::Dec, one);
        assert!(arena.get(dec).is_concrete());
        assert_eq!(arena.get(dec).bits(), None);
    }

    #[test]
    fn partition_is_enforced() {
        let mut arena = ValueArena::new();
        let a = arena.symbol(8);
        let gap = Pieces::from([(BitRange::new(0, 7), a), (BitRange::new(9, 31), a)]);
        assert!(matches!(arena.hybrid(gap), Err(XsymError::BrokenPartition)));
        let short = Pieces::from([(BitRange::new(0, 15), a)]);
        assert!(arena.hybrid(short).is_err());
    }

    #[test]
    fn hybrid_with_symbol_is_symbolic() {
        let mut arena = ValueArena::new();
        let (word, _) = split_word(&mut arena, 0x1234_5678);
        assert!(arena.get(word).is_hybrid());
        assert!(arena.is_symbolic(word));
    }

    #[test]
    fn shr_moves_pieces_down() {
        let mut arena = ValueArena::new();
        let (word, sym) = split_word(&mut arena, 0xaabb_cc08);
        let shifted = arena.shift_hybrid(word, OpTag::Shr, 8).unwrap();
        let pieces = arena.get(shifted).pieces().unwrap().clone();
        let ranges: Vec<BitRange> = pieces.keys().copied().collect();
        assert_eq!(
            ranges,
            vec![
                BitRange::new(0, 7),
                BitRange::new(8, 23),
                BitRange::new(24, 31)
            ]
        );
        assert_eq!(pieces[&BitRange::new(0, 7)], sym);
        assert_eq!(arena.known_value(pieces[&BitRange::new(8, 23)]), Some(0xaabb));
        assert_eq!(arena.known_value(pieces[&BitRange::new(24, 31)]), Some(0));
    }

    #[test]
    fn shr_past_a_symbol_wraps_it() {
        let mut arena = ValueArena::new();
        let (word, sym) = split_word(&mut arena, 0);
        let shifted = arena.shift_hybrid(word, OpTag::Shr, 12).unwrap();
        let pieces = arena.get(shifted).pieces().unwrap();
        let low = pieces[&BitRange::new(0, 3)];
        let op = arena.get(low).operation().unwrap();
        assert_eq!(op.tag(), OpTag::Shr);
        assert_eq!(op.operands()[0], sym);
        assert_eq!(arena.known_value(op.operands()[1]), Some(4));
    }

    #[test]
    fn shl_drops_overflowing_pieces() {
        let mut arena = ValueArena::new();
        let (word, sym) = split_word(&mut arena, 0xffff_00ff);
        let shifted = arena.shift_hybrid(word, OpTag::Shl, 16).unwrap();
        let pieces = arena.get(shifted).pieces().unwrap();
        let ranges: Vec<BitRange> = pieces.keys().copied().collect();
        assert_eq!(
            ranges,
            vec![
                BitRange::new(0, 15),
                BitRange::new(16, 23),
                BitRange::new(24, 31)
            ]
        );
        assert_eq!(pieces[&BitRange::new(24, 31)], sym);
        assert_eq!(arena.known_value(pieces[&BitRange::new(16, 23)]), Some(0xff));
    }

    #[test]
    fn and_mask_over_symbol_folds() {
        let mut arena = ValueArena::new();
        let (word, _) = split_word(&mut arena, 0x1234_5678);
        let folded = arena.fold_mask(word, OpTag::And, 0xffff_00ff).unwrap();
        assert!(arena.get(folded).is_concrete());
        assert_eq!(arena.known_value(folded), Some(0x1234_0078));
        assert!(arena.fold_mask(word, OpTag::And, 0x0000_0100).is_none());
    }

    #[test]
    fn or_mask_over_symbol_folds() {
        let mut arena = ValueArena::new();
        let (word, _) = split_word(&mut arena, 0x1234_5678);
        let folded = arena.fold_mask(word, OpTag::Or, 0x0000_ff01).unwrap();
        assert_eq!(arena.known_value(folded), Some(0x1234_ff79));
        assert!(arena.fold_mask(word, OpTag::Or, 0x0000_f000).is_none());
        assert!(arena.fold_mask(word, OpTag::Xor, 0).is_none());
    }
}
