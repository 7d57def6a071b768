//! Per-instruction transfer functions.
//!
//! Every transfer function resolves and validates its destination, then reads its sources,
//! then writes. A failure therefore leaves registers and memory untouched.

use crate::error::XsymError;
use crate::session::Session;
use crate::value::{OpTag, ValueId};
use itertools::Itertools;
use tracing::warn;
use xsym_trace::{AddressForm, Gpr, Instruction, MemoryOperand, Operand};

/// A validated write target
enum Place {
    Register(String),
    Memory { address: u32, bytes: u32 },
}

pub(super) fn apply(s: &mut Session, insn: &Instruction) -> Result<(), XsymError> {
    let ops = insn.operands.as_slice();
    match (insn.mnemonic.as_str(), ops) {
        (_, []) => Ok(()),
        ("push", [src]) => push(s, insn, src),
        ("pop", [dst]) => pop(s, insn, dst),
        (m, [op]) => {
            if op.is_immediate() {
                return Err(unsupported(insn));
            }
            let dst = destination(s, insn, op)?;
            let v = read(s, insn, op)?;
            let r = s.arena.unary(OpTag::from_mnemonic(m), v);
            write(s, &dst, r)
        }
        ("mov" | "movzx", [dst, src]) => {
            let dst = destination(s, insn, dst)?;
            let v = read(s, insn, src)?;
            write(s, &dst, v)
        }
        ("lea", [dst @ Operand::Register { .. }, Operand::Memory(m)]) => lea(s, insn, dst, m),
        ("lea", [_, _]) => Err(unsupported(insn)),
        ("xchg", [a, b]) => {
            let da = destination(s, insn, a)?;
            let db = destination(s, insn, b)?;
            let va = read(s, insn, a)?;
            let vb = read(s, insn, b)?;
            write(s, &da, vb)?;
            write(s, &db, va)
        }
        (m @ ("shl" | "sal" | "shr"), [dst @ Operand::Register { .. }, Operand::Immediate(n)]) => {
            let place = destination(s, insn, dst)?;
            let v = read(s, insn, dst)?;
            let tag = OpTag::from_mnemonic(m);
            let r = if s.arena.get(v).is_hybrid() {
                s.arena.shift_hybrid(v, tag, *n)?
            } else {
                let count = s.arena.concrete(*n);
                s.arena.binary(tag, v, count)
            };
            write(s, &place, r)
        }
        (m @ ("and" | "or"), [dst @ Operand::Register { .. }, Operand::Immediate(mask)]) => {
            let place = destination(s, insn, dst)?;
            let v = read(s, insn, dst)?;
            let tag = OpTag::from_mnemonic(m);
            let r = match s.arena.fold_mask(v, tag, *mask) {
                Some(folded) => folded,
                None => {
                    let imm = s.arena.concrete(*mask);
                    s.arena.binary(tag, v, imm)
                }
            };
            write(s, &place, r)
        }
        (m, [dst, src]) => {
            let place = destination(s, insn, dst)?;
            let b = read(s, insn, src)?;
            let a = read(s, insn, dst)?;
            let r = s.arena.binary(OpTag::from_mnemonic(m), a, b);
            write(s, &place, r)
        }
        (
            "imul",
            [
                dst @ Operand::Register { .. },
                src @ Operand::Register { .. },
                Operand::Immediate(k),
            ],
        ) => {
            let place = destination(s, insn, dst)?;
            let a = read(s, insn, src)?;
            let b = s.arena.concrete(*k);
            let r = s.arena.binary(OpTag::Imul, a, b);
            write(s, &place, r)
        }
        _ => Err(unsupported(insn)),
    }
}

fn push(s: &mut Session, insn: &Instruction, src: &Operand) -> Result<(), XsymError> {
    let bytes = match src {
        Operand::Immediate(_) => 4,
        other => other.byte_count(),
    };
    let address = match insn.write_address {
        Some(a) => a,
        None => {
            let a = insn.context.get(Gpr::Esp).wrapping_sub(bytes);
            warn!("{} has no recorded write address, using esp-{} = {:#x}", insn, bytes, a);
            a
        }
    };
    s.memory.check_write(address, bytes)?;
    let v = read(s, insn, src)?;
    s.memory.write(&mut s.arena, address, bytes, v)
}

fn pop(s: &mut Session, insn: &Instruction, dst: &Operand) -> Result<(), XsymError> {
    let place = destination(s, insn, dst)?;
    let bytes = dst.byte_count();
    let address = match insn.read_address {
        Some(a) => a,
        None => {
            let a = insn.context.get(Gpr::Esp);
            warn!("{} has no recorded read address, using esp = {:#x}", insn, a);
            a
        }
    };
    let v = s.memory.read(&mut s.arena, address, bytes)?;
    write(s, &place, v)
}

/// `lea` is modeled for `base + index*scale` only
fn lea(
    s: &mut Session,
    insn: &Instruction,
    dst: &Operand,
    m: &MemoryOperand,
) -> Result<(), XsymError> {
    match m.form {
        AddressForm::BaseIndex { base, index, scale } => {
            let place = destination(s, insn, dst)?;
            let b = s.registers.read(&mut s.arena, base.name())?;
            let i = s.registers.read(&mut s.arena, index.name())?;
            let k = s.arena.concrete(scale);
            let scaled = s.arena.binary(OpTag::Imul, i, k);
            let sum = s.arena.binary(OpTag::Add, b, scaled);
            write(s, &place, sum)
        }
        other => Err(XsymError::UnsupportedAddressForm(other.tag())),
    }
}

fn destination(s: &Session, insn: &Instruction, op: &Operand) -> Result<Place, XsymError> {
    match op {
        Operand::Register { name, .. } => {
            s.registers.check_write(name)?;
            Ok(Place::Register(name.clone()))
        }
        Operand::Memory(m) => {
            let address = address(insn, insn.write_address, m, "write")?;
            let bytes = m.byte_count();
            s.memory.check_write(address, bytes)?;
            Ok(Place::Memory { address, bytes })
        }
        Operand::Immediate(_) => Err(unsupported(insn)),
    }
}

fn read(s: &mut Session, insn: &Instruction, op: &Operand) -> Result<ValueId, XsymError> {
    match op {
        Operand::Immediate(v) => Ok(s.arena.concrete(*v)),
        Operand::Register { name, .. } => s.registers.read(&mut s.arena, name),
        Operand::Memory(m) => {
            let address = address(insn, insn.read_address, m, "read")?;
            s.memory.read(&mut s.arena, address, m.byte_count())
        }
    }
}

fn write(s: &mut Session, place: &Place, value: ValueId) -> Result<(), XsymError> {
    match place {
        Place::Register(name) => s.registers.write(&mut s.arena, name, value),
        Place::Memory { address, bytes } => s.memory.write(&mut s.arena, *address, *bytes, value),
    }
}

/// The recorded address if there is one, otherwise the address recomputed from the snapshot
fn address(
    insn: &Instruction,
    recorded: Option<u32>,
    m: &MemoryOperand,
    access: &'static str,
) -> Result<u32, XsymError> {
    if let Some(a) = recorded {
        return Ok(a);
    }
    let a = insn
        .effective_address(m)
        .map_err(|_| XsymError::MissingAddress {
            mnemonic: insn.mnemonic.clone(),
            access,
        })?;
    warn!("{} has no recorded {} address, computed {:#x}", insn, access, a);
    Ok(a)
}

fn unsupported(insn: &Instruction) -> XsymError {
    let shape = insn
        .operands
        .iter()
        .map(|o| match o {
            Operand::Immediate(_) => "imm",
            Operand::Register { .. } => "reg",
            Operand::Memory(_) => "mem",
        })
        .join(", ");
    XsymError::UnsupportedShape {
        mnemonic: insn.mnemonic.clone(),
        shape,
    }
}
