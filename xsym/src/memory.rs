use crate::error::XsymError;
use crate::value::{OpTag, ValueArena, ValueId};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// An inclusive range of byte addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddrRange {
    pub start: u32,
    pub end: u32,
}

impl AddrRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// The bytes touched by an access of `bytes` bytes at `address`. Accesses may not run past
    /// the top of the address space.
    pub fn for_access(address: u32, bytes: u32) -> Result<Self, XsymError> {
        let end = address
            .checked_add(bytes.max(1) - 1)
            .ok_or(XsymError::AddressWrap { address, bytes })?;
        Ok(Self {
            start: address,
            end,
        })
    }

    pub fn len(&self) -> u32 {
        self.end.wrapping_sub(self.start).wrapping_add(1)
    }

    pub fn contains(&self, other: &AddrRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn intersects(&self, other: &AddrRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl Display for AddrRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:#x},{:#x}]", self.start, self.end)
    }
}

/// How an access range relates to what is already stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// An entry with exactly this range exists
    Exact,
    /// No stored entry shares a byte with the access
    Fresh,
    /// The access lies inside this stored entry
    Within(AddrRange),
    /// The access contains every stored entry it touches
    Covering(Vec<AddrRange>),
    /// The access crosses the boundary of this stored entry
    Straddling(AddrRange),
}

/// Byte-addressed symbolic memory.
///
/// Stored ranges never overlap once a write returns.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    cells: BTreeMap<AddrRange, ValueId>,
    inputs: BTreeMap<ValueId, AddrRange>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, range: &AddrRange) -> Option<ValueId> {
        self.cells.get(range).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AddrRange, &ValueId)> {
        self.cells.iter()
    }

    /// Symbols created for first reads of untouched memory, with the bytes they stand for
    pub fn inputs(&self) -> &BTreeMap<ValueId, AddrRange> {
        &self.inputs
    }

    pub fn classify(&self, access: &AddrRange) -> Placement {
        if self.cells.contains_key(access) {
            return Placement::Exact;
        }
        let touched: Vec<AddrRange> = self
            .cells
            .keys()
            .filter(|r| r.intersects(access))
            .copied()
            .collect();
        let placement = if touched.is_empty() {
            Placement::Fresh
        } else if let Some(outer) = touched.iter().find(|r| r.contains(access)) {
            Placement::Within(*outer)
        } else if let Some(crossed) = touched.iter().find(|r| !access.contains(r)) {
            Placement::Straddling(*crossed)
        } else {
            Placement::Covering(touched)
        };
        tracing::trace!("{} classified as {:?}", access, placement);
        placement
    }

    /// Fails with the same error a write to `address` would, without changing anything
    pub fn check_write(&self, address: u32, bytes: u32) -> Result<(), XsymError> {
        let access = AddrRange::for_access(address, bytes)?;
        match self.classify(&access) {
            Placement::Straddling(stored) => Err(XsymError::PartialOverlap { access, stored }),
            Placement::Within(stored) if stored.len() > 4 => {
                Err(XsymError::OversizedRange(stored))
            }
            _ => Ok(()),
        }
    }

    /// Read `bytes` bytes at `address`. Untouched memory yields a fresh input symbol, which is
    /// remembered so later reads of the same bytes agree.
    pub fn read(
        &mut self,
        arena: &mut ValueArena,
        address: u32,
        bytes: u32,
    ) -> Result<ValueId, XsymError> {
        let access = AddrRange::for_access(address, bytes)?;
        match self.classify(&access) {
            Placement::Exact => self.stored(access),
            Placement::Fresh => {
                let sym = arena.symbol(bytes * 8);
                self.cells.insert(access, sym);
                self.inputs.insert(sym, access);
                Ok(sym)
            }
            Placement::Within(stored) => {
                let whole = self.stored(stored)?;
                let (mask, shift) = byte_mask(&stored, &access)?;
                let mask = arena.concrete(mask);
                let masked = arena.binary(OpTag::And, whole, mask);
                let shift = arena.concrete(shift);
                Ok(arena.binary_sized(OpTag::Shr, masked, shift, bytes * 8))
            }
            Placement::Covering(inner) => Err(XsymError::PartialOverlap {
                access,
                stored: inner[0],
            }),
            Placement::Straddling(stored) => Err(XsymError::PartialOverlap { access, stored }),
        }
    }

    /// Write `value` over `bytes` bytes at `address`
    pub fn write(
        &mut self,
        arena: &mut ValueArena,
        address: u32,
        bytes: u32,
        value: ValueId,
    ) -> Result<(), XsymError> {
        let access = AddrRange::for_access(address, bytes)?;
        match self.classify(&access) {
            Placement::Exact | Placement::Fresh => {
                self.cells.insert(access, value);
            }
            Placement::Covering(inner) => {
                for r in inner {
                    self.cells.remove(&r);
                }
                self.cells.insert(access, value);
            }
            Placement::Within(stored) => {
                let whole = self.stored(stored)?;
                let (mask, shift) = byte_mask(&stored, &access)?;
                let keep = arena.concrete(!mask);
                let kept = arena.binary(OpTag::And, whole, keep);
                let shift = arena.concrete(shift);
                let moved = arena.binary(OpTag::Shl, value, shift);
                let merged = arena.binary(OpTag::Or, kept, moved);
                self.cells.insert(stored, merged);
            }
            Placement::Straddling(stored) => {
                return Err(XsymError::PartialOverlap { access, stored });
            }
        }
        Ok(())
    }

    fn stored(&self, range: AddrRange) -> Result<ValueId, XsymError> {
        self.get(&range)
            .ok_or(XsymError::PartialOverlap { access: range, stored: range })
    }
}

/// The mask selecting `inner`'s bytes within the word stored at `outer`, and the bit offset of
/// `inner`'s first byte. The lowest address is the least significant byte.
fn byte_mask(outer: &AddrRange, inner: &AddrRange) -> Result<(u32, u32), XsymError> {
    if outer.len() > 4 {
        return Err(XsymError::OversizedRange(*outer));
    }
    let offset = inner.start - outer.start;
    let mask = (offset..offset + inner.len()).fold(0u32, |m, byte| m | (0xff << (byte * 8)));
    Ok((mask, offset * 8))
}
