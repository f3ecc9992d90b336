#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;

use crate::{
    types, verify_function, verify_module, BinOp, CastOp, FunctionId, InsertPoint, IntCC,
    IrBuilder, IrError, IrType, Jit, Module, TargetDesc,
};

fn builder() -> IrBuilder {
    IrBuilder::new(Module::new("test", TargetDesc::host()))
}

fn define(b: &mut IrBuilder, name: &str, params: &[IrType], ret: IrType) -> (FunctionId, InsertPoint) {
    let func = b.declare_function(name, params, ret).unwrap();
    let entry = b.append_block(func, "entry");
    (func, InsertPoint::new(func, entry))
}

fn i64_ty() -> IrType {
    IrType::Scalar(types::I64)
}

#[test]
fn add_runs_under_jit() {
    let mut b = builder();
    let (func, at) = define(&mut b, "add", &[i64_ty(), i64_ty()], i64_ty());
    let sum = b.binary(at, BinOp::Add, b.param(func, 0), b.param(func, 1), "sum");
    b.ret(at, sum);

    let module = b.into_module().unwrap();
    verify_module(&module).unwrap();
    let jit = Jit::new(&module).unwrap();
    #[allow(unsafe_code)]
    let add = unsafe { jit.get::<extern "C" fn(i64, i64) -> i64>("add") }.unwrap();
    assert_eq!(add(40, 2), 42);
}

#[test]
fn branches_and_stack_slots() {
    // max(a, b) through a stack slot
    let mut b = builder();
    let (func, at) = define(&mut b, "max", &[i64_ty(), i64_ty()], i64_ty());
    let slot = b.entry_alloca(func, i64_ty(), "slot").unwrap();
    let (x, y) = (b.param(func, 0), b.param(func, 1));
    let then_block = b.append_block(func, "then");
    let else_block = b.append_block(func, "else");
    let done = b.append_block(func, "done");
    let greater = b.icmp(at, IntCC::SignedGreaterThan, x, y, "gt");
    b.cond_br(at, greater, then_block, else_block);
    b.store(at.at_block(then_block), x, slot);
    b.br(at.at_block(then_block), done);
    b.store(at.at_block(else_block), y, slot);
    b.br(at.at_block(else_block), done);
    let result = b.load(at.at_block(done), types::I64, slot, "result");
    b.ret(at.at_block(done), result);

    let module = b.into_module().unwrap();
    verify_function(&module, func).unwrap();
    let jit = Jit::new(&module).unwrap();
    #[allow(unsafe_code)]
    let max = unsafe { jit.get::<extern "C" fn(i64, i64) -> i64>("max") }.unwrap();
    assert_eq!(max(3, -7), 3);
    assert_eq!(max(-3, 7), 7);
}

#[test]
fn struct_fields_are_naturally_aligned() {
    let mut b = builder();
    let pair = b.add_struct(
        "Pair",
        vec![IrType::Scalar(types::I8), IrType::Scalar(types::I64)],
    );
    let module = b.module();
    assert_eq!(module.field_offset(pair, 0), 0);
    assert_eq!(module.field_offset(pair, 1), 8);
    assert_eq!(module.size_of(IrType::Struct(pair)), 16);
    assert_eq!(module.align_of(IrType::Struct(pair)), 8);
}

#[test]
fn struct_gep_writes_the_right_field() {
    let mut b = builder();
    let pair = b.add_struct("Pair", vec![IrType::Scalar(types::I8), i64_ty()]);
    let (func, at) = define(&mut b, "second", &[i64_ty()], i64_ty());
    let slot = b.entry_alloca(func, IrType::Struct(pair), "pair").unwrap();
    let zero = b.const_int(func, types::I8, 0).unwrap();
    let first = b.struct_gep(at, pair, slot, 0, "first");
    b.store(at, zero, first);
    let second = b.struct_gep(at, pair, slot, 1, "second");
    b.store(at, b.param(func, 0), second);
    let loaded = b.load(at, types::I64, second, "loaded");
    b.ret(at, loaded);

    let module = b.into_module().unwrap();
    let jit = Jit::new(&module).unwrap();
    #[allow(unsafe_code)]
    let f = unsafe { jit.get::<extern "C" fn(i64) -> i64>("second") }.unwrap();
    assert_eq!(f(-99), -99);
}

#[test]
fn float_to_narrow_int_drops_the_fraction() {
    let mut b = builder();
    let (func, at) = define(
        &mut b,
        "to_u8",
        &[IrType::Scalar(types::F64)],
        IrType::Scalar(types::I8),
    );
    let v = b.cast(at, CastOp::FpToUi, b.param(func, 0), types::I8, "v");
    b.ret(at, v);

    let module = b.into_module().unwrap();
    let jit = Jit::new(&module).unwrap();
    #[allow(unsafe_code)]
    let f = unsafe { jit.get::<extern "C" fn(f64) -> u8>("to_u8") }.unwrap();
    assert_eq!(f(200.7), 200);
    assert_eq!(f(-0.5), 0);
}

#[test]
fn emission_after_terminator_is_counted() {
    let mut b = builder();
    let (func, at) = define(&mut b, "f", &[], IrType::Void);
    b.ret_void(at);
    let one = b.const_int(func, types::I64, 1).unwrap();
    b.binary(at, BinOp::Add, one, one, "late");
    b.ret_void(at);
    assert_eq!(b.codegen_error_count(), 2);
    assert_eq!(
        b.into_module().unwrap_err(),
        IrError::MalformedInstructions { count: 2 }
    );
}

#[test]
fn unterminated_block_fails_verification() {
    let mut b = builder();
    let (func, at) = define(&mut b, "f", &[], IrType::Void);
    b.append_block(func, "orphan");
    b.ret_void(at);
    let module = b.into_module().unwrap();
    let err = verify_function(&module, func).unwrap_err();
    assert_eq!(err.function, "f");
    assert!(err.message.contains("orphan"), "{}", err.message);
}

#[test]
fn duplicate_function_is_rejected() {
    let mut b = builder();
    b.declare_function("f", &[], IrType::Void).unwrap();
    assert_eq!(
        b.declare_function("f", &[], IrType::Void),
        Err(IrError::DuplicateFunction("f".to_owned()))
    );
}

#[test]
fn struct_parameters_are_rejected() {
    let mut b = builder();
    let pair = b.add_struct("Pair", vec![i64_ty()]);
    let err = b
        .declare_function("f", &[IrType::Struct(pair)], IrType::Void)
        .unwrap_err();
    assert!(matches!(err, IrError::UnsupportedSignature { .. }));
}

#[test]
fn constants_need_a_body() {
    let mut b = builder();
    let func = b.declare_function("ext", &[], IrType::Void).unwrap();
    assert_eq!(
        b.const_int(func, types::I64, 1),
        Err(IrError::MissingBody("ext".to_owned()))
    );
}

#[test]
fn dump_lists_data_declarations_and_names() {
    let mut b = builder();
    b.declare_function("malloc", &[i64_ty()], IrType::Scalar(b.pointer_type()))
        .unwrap();
    let ptr = IrType::Scalar(b.pointer_type());
    let (func, at) = define(&mut b, "hello", &[], ptr);
    let s = b.global_string(func, "greeting", "hi\n").unwrap();
    b.ret(at, s);

    let text = b.module().to_string();
    assert!(text.contains(r#"data %greeting = "hi\n\x00""#), "{text}");
    assert!(text.contains("declare %malloc"), "{text}");
    assert!(text.contains("function %hello("), "{text}");
    assert!(text.contains("= greeting"), "{text}");
}

#[test]
fn string_globals_are_readable_from_jit_code() {
    let mut b = builder();
    let (func, at) = define(&mut b, "second_byte", &[], IrType::Scalar(types::I8));
    let s = b.global_string(func, "", "xyz").unwrap();
    let one = b.const_int(func, b.pointer_type(), 1).unwrap();
    let p = b.binary(at, BinOp::Add, s, one, "p");
    let byte = b.load(at, types::I8, p, "byte");
    b.ret(at, byte);

    let module = b.into_module().unwrap();
    assert_eq!(module.global(crate::GlobalId::from_len(0)).name, ".str.0");
    let jit = Jit::new(&module).unwrap();
    #[allow(unsafe_code)]
    let f = unsafe { jit.get::<extern "C" fn() -> u8>("second_byte") }.unwrap();
    assert_eq!(f(), b'y');
}

#[test]
fn foreign_target_is_not_jitted() {
    let host = TargetDesc::host();
    let other = if host.pointer_bytes() == 8 {
        "i686-unknown-linux-gnu"
    } else {
        "x86_64-unknown-linux-gnu"
    };
    let module = Module::new("m", TargetDesc::from_triple(other).unwrap());
    assert!(matches!(Jit::new(&module), Err(IrError::Jit(_))));
}
