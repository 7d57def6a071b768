use super::*;
use crate::formula::{ArenaDisplayable, RenderStyle};
use crate::value::{BitRange, OpTag};
use xsym_trace::{AddressForm, Displacement, MemoryOperand, Operand};

fn reg(name: &str) -> Operand {
    Operand::register(name).unwrap()
}

fn imm(v: u32) -> Operand {
    Operand::Immediate(v)
}

fn mem(form: AddressForm, bits: u32) -> Operand {
    Operand::memory(form, bits).unwrap()
}

fn insn(mnemonic: &str, operands: Vec<Operand>) -> Instruction {
    Instruction::new(0x401000, mnemonic, operands)
}

#[test]
fn test_skipped_mnemonics_change_nothing() {
    let mut s = Session::new();
    let before = s.register(Gpr::Eax);
    s.step(&insn("cmp", vec![reg("eax"), imm(1)])).unwrap();
    s.step(&insn("jnz", vec![imm(0x401020)])).unwrap();
    s.step(&insn("nop", vec![])).unwrap();
    assert_eq!(s.register(Gpr::Eax), before);
    assert_eq!(s.executed(), 1);
}

#[test]
fn test_custom_skip_set() {
    let config = InterpreterConfig::default().with_skipped("inc");
    let mut s = Session::with_config(config);
    let before = s.register(Gpr::Ecx);
    s.step(&insn("inc", vec![reg("ecx")])).unwrap();
    assert_eq!(s.register(Gpr::Ecx), before);
}

#[test]
fn test_mov_is_a_pure_copy() {
    let mut s = Session::new();
    let ebx = s.register(Gpr::Ebx);
    s.step(&insn("mov", vec![reg("eax"), reg("ebx")])).unwrap();
    assert_eq!(s.register(Gpr::Eax), ebx);
    let len = s.arena().len();
    s.step(&insn("mov", vec![reg("ecx"), reg("eax")])).unwrap();
    assert_eq!(s.arena().len(), len);
}

#[test]
fn test_binary_reads_source_then_destination() {
    let mut s = Session::new();
    let eax = s.register(Gpr::Eax).unwrap();
    let ebx = s.register(Gpr::Ebx).unwrap();
    s.step(&insn("sub", vec![reg("eax"), reg("ebx")])).unwrap();
    let r = s.register(Gpr::Eax).unwrap();
    let op = s.arena().get(r).operation().unwrap();
    assert_eq!(op.tag(), OpTag::Sub);
    assert_eq!(op.operands(), &[eax, ebx]);
}

#[test]
fn test_unary_on_memory() {
    let mut s = Session::new();
    let m = mem(
        AddressForm::BaseDisp {
            base: Gpr::Ebp,
            disp: Displacement::Minus(4),
        },
        32,
    );
    let step = insn("neg", vec![m]).with_read(0xffb0).with_write(0xffb0);
    s.step(&step).unwrap();
    let range = AddrRange::for_access(0xffb0, 4).unwrap();
    let v = s.memory_value(&range).unwrap();
    let op = s.arena().get(v).operation().unwrap();
    assert_eq!(op.tag(), OpTag::Neg);
    let input = op.operands()[0];
    assert_eq!(
        s.input_location(input),
        Some(InputLocation::Memory(range))
    );
}

#[test]
fn test_immediate_unary_is_rejected() {
    let mut s = Session::new();
    let err = s.step(&insn("inc", vec![imm(1)])).unwrap_err();
    assert!(matches!(err, XsymError::UnsupportedShape { shape, .. } if shape == "imm"));
}

#[test]
fn test_movzx_is_a_pure_copy() {
    let mut s = Session::new();
    let byte = mem(AddressForm::Absolute { address: 0x40 }, 8);
    s.step(&insn("movzx", vec![reg("eax"), byte]).with_read(0x40))
        .unwrap();
    let stored = s.memory_value(&AddrRange::new(0x40, 0x40)).unwrap();
    assert_eq!(s.register(Gpr::Eax), Some(stored));
    assert_eq!(s.arena().get(stored).width(), 8);
    let len = s.arena().len();
    s.step(&insn("movzx", vec![reg("ecx"), reg("eax")])).unwrap();
    assert_eq!(s.register(Gpr::Ecx), Some(stored));
    assert_eq!(s.arena().len(), len);
}

#[test]
fn test_xchg_with_memory() {
    let mut s = Session::new();
    let eax = s.register(Gpr::Eax).unwrap();
    let word = mem(AddressForm::Absolute { address: 0x100 }, 32);
    s.step(
        &insn("xchg", vec![word, reg("eax")])
            .with_read(0x100)
            .with_write(0x100),
    )
    .unwrap();
    let range = AddrRange::new(0x100, 0x103);
    assert_eq!(s.memory_value(&range), Some(eax));
    let loaded = s.register(Gpr::Eax).unwrap();
    assert_ne!(loaded, eax);
    assert_eq!(s.input_location(loaded), Some(InputLocation::Memory(range)));
}

#[test]
fn test_lea_base_index() {
    let mut s = Session::new();
    let form = AddressForm::BaseIndex {
        base: Gpr::Esi,
        index: Gpr::Edi,
        scale: 4,
    };
    s.step(&insn("lea", vec![reg("eax"), mem(form, 32)])).unwrap();
    let eax = s.register(Gpr::Eax).unwrap();
    assert_eq!(
        eax.display(s.arena()).to_string(),
        "(add sym4 (imul sym5 0x4))"
    );
    assert!(s.memory().iter().next().is_none());
}

#[test]
fn test_lea_other_forms_are_rejected() {
    let mut s = Session::new();
    let form = AddressForm::BaseDisp {
        base: Gpr::Esi,
        disp: Displacement::Plus(8),
    };
    let err = s
        .step(&insn("lea", vec![reg("eax"), mem(form, 32)]))
        .unwrap_err();
    assert!(matches!(err, XsymError::UnsupportedAddressForm(4)));
}

#[test]
fn test_xchg_swaps() {
    let mut s = Session::new();
    let a = s.register(Gpr::Eax);
    let d = s.register(Gpr::Edx);
    s.step(&insn("xchg", vec![reg("eax"), reg("edx")])).unwrap();
    assert_eq!(s.register(Gpr::Eax), d);
    assert_eq!(s.register(Gpr::Edx), a);
}

#[test]
fn test_three_operand_imul() {
    let mut s = Session::new();
    s.step(&insn("imul", vec![reg("eax"), reg("ecx"), imm(3)]))
        .unwrap();
    let eax = s.register(Gpr::Eax).unwrap();
    assert_eq!(eax.display(s.arena()).to_string(), "(imul sym2 0x3)");
}

#[test]
fn test_and_folds_over_hybrid() {
    let mut s = Session::new();
    let k = s.arena_mut().concrete(0x1234_5678);
    s.set_register(Gpr::Ebx, k);
    let byte = s.arena_mut().symbol(8);
    s.registers.write(&mut s.arena, "bh", byte).unwrap();
    let len = s.arena().len();
    s.step(&insn("and", vec![reg("ebx"), imm(0x0000_00ff)]))
        .unwrap();
    let ebx = s.register(Gpr::Ebx).unwrap();
    assert_eq!(s.arena().len(), len + 1);
    assert_eq!(s.arena().known_value(ebx), Some(0x78));
    assert!(s.arena().get(ebx).is_concrete());
}

#[test]
fn test_and_that_keeps_symbolic_bits_is_generic() {
    let mut s = Session::new();
    let k = s.arena_mut().concrete(0x1234_5678);
    s.set_register(Gpr::Ebx, k);
    let byte = s.arena_mut().symbol(8);
    s.registers.write(&mut s.arena, "bh", byte).unwrap();
    let hybrid = s.register(Gpr::Ebx).unwrap();
    s.step(&insn("and", vec![reg("ebx"), imm(0x0000_ffff)]))
        .unwrap();
    let ebx = s.register(Gpr::Ebx).unwrap();
    let op = s.arena().get(ebx).operation().unwrap();
    assert_eq!(op.tag(), OpTag::And);
    assert_eq!(op.operands()[0], hybrid);
}

#[test]
fn test_or_folds_over_hybrid() {
    let mut s = Session::new();
    let k = s.arena_mut().concrete(0x1234_5678);
    s.set_register(Gpr::Ebx, k);
    let byte = s.arena_mut().symbol(8);
    s.registers.write(&mut s.arena, "bh", byte).unwrap();
    let len = s.arena().len();
    s.step(&insn("or", vec![reg("ebx"), imm(0x0000_ff00)]))
        .unwrap();
    let ebx = s.register(Gpr::Ebx).unwrap();
    assert_eq!(s.arena().known_value(ebx), Some(0x1234_ff78));
    assert!(s.arena().get(ebx).is_concrete());
    assert_eq!(s.arena().len(), len + 1);
}

#[test]
fn test_shl_on_hybrid_keeps_pieces() {
    let mut s = Session::new();
    let k = s.arena_mut().concrete(0);
    s.set_register(Gpr::Ecx, k);
    let byte = s.arena_mut().symbol(8);
    s.registers.write(&mut s.arena, "ch", byte).unwrap();
    let len = s.arena().len();
    s.step(&insn("shl", vec![reg("ecx"), imm(8)])).unwrap();
    let ecx = s.register(Gpr::Ecx).unwrap();
    let pieces = s.arena().get(ecx).pieces().unwrap();
    assert_eq!(pieces[&BitRange::new(16, 23)], byte);
    // three rebuilt concrete pieces and the new word, no stray count node
    assert_eq!(s.arena().len(), len + 4);
}

#[test]
fn test_push_immediate_writes_a_word() {
    let mut s = Session::new();
    s.step(&insn("push", vec![imm(0x10)]).with_write(0xff00))
        .unwrap();
    let v = s
        .memory_value(&AddrRange::new(0xff00, 0xff03))
        .unwrap();
    assert_eq!(s.arena().known_value(v), Some(0x10));
}

#[test]
fn test_push_falls_back_to_esp() {
    let mut s = Session::new();
    let mut ctx = RegisterSnapshot::default();
    ctx.set(Gpr::Esp, 0x2000);
    s.step(&insn("push", vec![reg("ax")]).with_context(ctx))
        .unwrap();
    assert!(s.memory_value(&AddrRange::new(0x1ffe, 0x1fff)).is_some());
}

#[test]
fn test_push_memory_operand_writes_its_width() {
    let mut s = Session::new();
    let half = mem(AddressForm::Absolute { address: 0x3000 }, 16);
    s.step(
        &insn("push", vec![half])
            .with_read(0x3000)
            .with_write(0xff00),
    )
    .unwrap();
    let source = s.memory_value(&AddrRange::new(0x3000, 0x3001)).unwrap();
    assert_eq!(
        s.memory_value(&AddrRange::new(0xff00, 0xff01)),
        Some(source)
    );
    assert_eq!(s.memory().iter().count(), 2);
}

#[test]
fn test_pop_into_memory() {
    let mut s = Session::new();
    let esi = s.register(Gpr::Esi).unwrap();
    s.step(&insn("push", vec![reg("esi")]).with_write(0xff00))
        .unwrap();
    let slot = mem(AddressForm::Absolute { address: 0x3000 }, 32);
    s.step(
        &insn("pop", vec![slot])
            .with_read(0xff00)
            .with_write(0x3000),
    )
    .unwrap();
    assert_eq!(s.memory_value(&AddrRange::new(0x3000, 0x3003)), Some(esi));
    assert!(s.memory().inputs().is_empty());
}

#[test]
fn test_failed_write_leaves_state() {
    let mut s = Session::new();
    let word = mem(AddressForm::Absolute { address: 0x3000 }, 32);
    s.step(&insn("mov", vec![reg("eax"), word.clone()]).with_read(0x3000))
        .unwrap();
    let straddle = mem(AddressForm::Absolute { address: 0x3002 }, 32);
    let fresh = mem(AddressForm::Absolute { address: 0x5000 }, 32);
    let bad = insn("add", vec![straddle, fresh])
        .with_read(0x5000)
        .with_write(0x3002);
    assert!(matches!(
        s.step(&bad),
        Err(XsymError::PartialOverlap { .. })
    ));
    assert_eq!(s.memory().iter().count(), 1);
    assert!(s.memory().inputs().len() == 1);
}

#[test]
fn test_missing_segment_address() {
    let mut s = Session::new();
    let mut m = MemoryOperand::new(AddressForm::Absolute { address: 0x30 }, 32).unwrap();
    m.segment = Some("fs".to_string());
    let err = s
        .step(&insn("mov", vec![reg("eax"), Operand::Memory(m)]))
        .unwrap_err();
    assert!(matches!(
        err,
        XsymError::MissingAddress { access: "read", .. }
    ));
}

#[test]
fn test_run_wraps_errors_with_position() {
    let mut s = Session::new();
    let trace = vec![
        insn("mov", vec![reg("eax"), imm(1)]),
        insn("shld", vec![reg("eax"), reg("ebx"), imm(4)]),
    ];
    let err = s.run(&trace).unwrap_err();
    match &err {
        XsymError::AtInstruction {
            index, mnemonic, ..
        } => {
            assert_eq!(*index, 1);
            assert_eq!(mnemonic, "shld");
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(matches!(
        err.root_cause(),
        XsymError::UnsupportedShape { shape, .. } if shape == "reg, reg, imm"
    ));
}

#[test]
fn test_outputs_and_reports() {
    let mut s = Session::new();
    let eax = s.register(Gpr::Eax).unwrap();
    let ebx = s.register(Gpr::Ebx).unwrap();
    s.step(&insn("add", vec![reg("eax"), reg("ebx")])).unwrap();
    let outputs = s.outputs();
    assert_eq!(outputs, vec![s.register(Gpr::Eax).unwrap()]);
    let report = s.register_report("eax", RenderStyle::Plain).unwrap();
    assert_eq!(
        report.inputs,
        vec![
            (eax, Some(InputLocation::Register(Gpr::Eax))),
            (ebx, Some(InputLocation::Register(Gpr::Ebx))),
        ]
    );
    assert_eq!(
        report.to_string(),
        "2 input symbols:\nsym0: eax\nsym1: ebx\n\nsym8=\n(add sym0 sym1)"
    );
    assert!(s.register_dump(RenderStyle::Plain).starts_with("eax: 2 input symbols:"));
}

#[test]
fn test_initial_values_are_concrete() {
    let mut ctx = RegisterSnapshot::default();
    ctx.set(Gpr::Eax, 7);
    let mut s = Session::with_initial_values(InterpreterConfig::default(), ctx);
    s.step(&insn("inc", vec![reg("eax")])).unwrap();
    let eax = s.register(Gpr::Eax).unwrap();
    assert_eq!(s.arena().known_value(eax), Some(8));
    assert!(s.registers().inputs().is_empty());
}
