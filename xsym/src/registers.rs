use crate::error::XsymError;
use crate::value::{BitRange, Bits, OpTag, Pieces, ValueArena, ValueId};
use std::collections::BTreeMap;
use xsym_trace::{Gpr, RegisterView, TraceError};

/// The eight 32-bit general-purpose registers.
///
/// Only whole registers are stored. Narrower names are views derived on every read and
/// folded back into the owning register on every write.
#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    slots: [Option<ValueId>; 8],
    inputs: BTreeMap<ValueId, Gpr>,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `gpr` a fresh symbol standing for its content on trace entry
    pub fn seed(&mut self, arena: &mut ValueArena, gpr: Gpr) -> ValueId {
        let sym = arena.symbol(32);
        self.inputs.insert(sym, gpr);
        self.slots[gpr.index()] = Some(sym);
        sym
    }

    /// Place a caller-built value in `gpr` without registering it as an input
    pub fn set(&mut self, gpr: Gpr, value: ValueId) {
        self.slots[gpr.index()] = Some(value);
    }

    pub fn get(&self, gpr: Gpr) -> Option<ValueId> {
        self.slots[gpr.index()]
    }

    fn owner(&self, gpr: Gpr) -> Result<ValueId, XsymError> {
        self.get(gpr).ok_or(XsymError::UnseededRegister(gpr))
    }

    /// The register each entry symbol was seeded into
    pub fn inputs(&self) -> &BTreeMap<ValueId, Gpr> {
        &self.inputs
    }

    pub fn iter(&self) -> impl Iterator<Item = (Gpr, ValueId)> + '_ {
        Gpr::ALL
            .into_iter()
            .filter_map(|g| self.get(g).map(|v| (g, v)))
    }

    /// Fails with the same error a write to `name` would, without changing anything
    pub fn check_write(&self, name: &str) -> Result<(), XsymError> {
        match parse_view(name)? {
            RegisterView::Full(_) => Ok(()),
            view => self.owner(view.owner()).map(|_| ()),
        }
    }

    /// Read a register by name. Sub-register reads may build new values in the arena but never
    /// change the register file.
    pub fn read(&self, arena: &mut ValueArena, name: &str) -> Result<ValueId, XsymError> {
        let view = parse_view(name)?;
        let owner = self.owner(view.owner())?;
        let value = match view {
            RegisterView::Full(_) => owner,
            RegisterView::Low16(_) => Self::low_view(arena, owner, 16),
            RegisterView::Low8(_) => Self::low_view(arena, owner, 8),
            RegisterView::High8(_) => {
                let (low, high) = view.bit_span();
                match piece_at(arena, owner, BitRange::new(low, high)) {
                    Some(piece) => piece,
                    None => {
                        let mask = arena.concrete(0x0000_ff00);
                        let masked = arena.binary(OpTag::And, owner, mask);
                        let eight = arena.concrete(8);
                        arena.binary_sized(OpTag::Shr, masked, eight, 8)
                    }
                }
            }
        };
        Ok(value)
    }

    fn low_view(arena: &mut ValueArena, owner: ValueId, bits: u32) -> ValueId {
        match piece_at(arena, owner, BitRange::low_bits(bits)) {
            Some(piece) => piece,
            None => {
                let mask = arena.concrete(BitRange::low_bits(bits).mask());
                arena.binary_sized(OpTag::And, owner, mask, bits)
            }
        }
    }

    /// Write a register by name. Sub-register writes replace the owning register with a value
    /// that merges the new bits into the old ones.
    pub fn write(
        &mut self,
        arena: &mut ValueArena,
        name: &str,
        value: ValueId,
    ) -> Result<(), XsymError> {
        let view = parse_view(name)?;
        let gpr = view.owner();
        let merged = match view {
            RegisterView::Full(_) => value,
            RegisterView::Low16(_) => {
                let owner = self.owner(gpr)?;
                Self::merge_low(arena, owner, value, 0xffff_0000)
            }
            RegisterView::Low8(_) => {
                let owner = self.owner(gpr)?;
                Self::merge_low(arena, owner, value, 0xffff_ff00)
            }
            RegisterView::High8(_) => {
                let owner = self.owner(gpr)?;
                Self::merge_high_byte(arena, owner, value)?
            }
        };
        self.slots[gpr.index()] = Some(merged);
        Ok(())
    }

    fn merge_low(arena: &mut ValueArena, owner: ValueId, value: ValueId, keep: u32) -> ValueId {
        let mask = arena.concrete(keep);
        let kept = arena.binary(OpTag::And, owner, mask);
        arena.binary(OpTag::Or, kept, value)
    }

    /// A symbolic byte landing in a fully known register splits it into three tracked pieces;
    /// anything else goes through the mask-and-merge formula.
    fn merge_high_byte(
        arena: &mut ValueArena,
        owner: ValueId,
        value: ValueId,
    ) -> Result<ValueId, XsymError> {
        let known = match arena.get(owner).is_concrete() {
            true => arena.known_value(owner),
            false => None,
        };
        match known {
            Some(word) if arena.get(value).is_symbol() => {
                let low = arena.concrete_bits(Bits::new(word, BitRange::new(0, 7)));
                let high = arena.concrete_bits(Bits::new(word, BitRange::new(16, 31)));
                let pieces = Pieces::from([
                    (BitRange::new(0, 7), low),
                    (BitRange::new(8, 15), value),
                    (BitRange::new(16, 31), high),
                ]);
                arena.hybrid(pieces)
            }
            _ => {
                let mask = arena.concrete(0xffff_00ff);
                let kept = arena.binary(OpTag::And, owner, mask);
                let eight = arena.concrete(8);
                let moved = arena.binary(OpTag::Shl, value, eight);
                Ok(arena.binary(OpTag::Or, kept, moved))
            }
        }
    }
}

fn parse_view(name: &str) -> Result<RegisterView, XsymError> {
    name.parse().map_err(|e| match e {
        TraceError::UnknownRegister(n) => XsymError::UnknownRegister(n),
        other => XsymError::Trace(other),
    })
}

/// The hybrid piece of `owner` spanning exactly `range`, if there is one
fn piece_at(arena: &ValueArena, owner: ValueId, range: BitRange) -> Option<ValueId> {
    arena.get(owner).pieces()?.get(&range).copied()
}
