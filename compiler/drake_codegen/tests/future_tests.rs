//! Deferred writes observed through generated code.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;

use drake_codegen::{BinaryOp, CodegenCx, CodegenError, CodegenOptions, FunctionId, Module, TyId};
use drake_ir::Jit;

fn cx() -> CodegenCx {
    CodegenCx::new("futures", CodegenOptions::default()).unwrap()
}

fn call_instructions(module: &Module, func: FunctionId) -> usize {
    module
        .function(func)
        .body()
        .unwrap()
        .to_string()
        .matches("call fn")
        .count()
}

/// Run `main() -> u64` of a finished module.
fn run_main(module: &Module) -> u64 {
    let jit = Jit::new(module).unwrap();
    #[allow(unsafe_code)]
    let main = unsafe { jit.get::<extern "C" fn() -> u64>("main") }.unwrap();
    main()
}

/// `void bump(u64* p) { *p += 1; }`
fn declare_bump(cx: &mut CodegenCx) -> FunctionId {
    let ptr = cx.types_mut().int_ptr(64);
    let bump = cx
        .declare_function(TyId::VOID, "bump", &[("p", ptr)], true)
        .unwrap();
    let at = cx.entry(bump).unwrap();
    let p = cx.param(bump, 0);
    let v = cx.load_value(at, p, true, "v").unwrap();
    let one = cx.const_size(bump, 1).unwrap();
    let next = cx.binary_op(at, BinaryOp::Add, v, one, "next").unwrap();
    cx.store(at, p, next).unwrap();
    cx.ret_void(at).unwrap();
    bump
}

#[test]
fn void_future_runs_once() {
    let mut cx = cx();
    let bump = declare_bump(&mut cx);

    let main = cx.declare_function(TyId::SIZE, "main", &[], true).unwrap();
    let at = cx.entry(main).unwrap();
    let zero = cx.const_size(main, 0).unwrap();
    let count = cx.declare_local(main, TyId::SIZE, "count", Some(zero)).unwrap();
    let count_ptr = cx.get_value_ptr(at, count).unwrap();
    let flag = cx.declare_local(main, TyId::SIZE, "flag", None).unwrap();
    cx.set_future_call(at, flag, bump, &[count_ptr]).unwrap();

    cx.load_value(at, flag, false, "first").unwrap();
    cx.load_value(at, flag, false, "second").unwrap();
    let result = cx.load_value(at, count, false, "result").unwrap();
    cx.ret(at, result).unwrap();

    let module = cx.finish().unwrap();
    assert_eq!(call_instructions(&module, main), 1);
    assert_eq!(run_main(&module), 1);
}

#[test]
fn value_future_call_stores_its_result() {
    let mut cx = cx();
    let square = cx
        .declare_function(TyId::SIZE, "square", &[("x", TyId::SIZE)], true)
        .unwrap();
    let at = cx.entry(square).unwrap();
    let x = cx.param(square, 0);
    let sq = cx.binary_op(at, BinaryOp::Mul, x, x, "sq").unwrap();
    cx.ret(at, sq).unwrap();

    let main = cx.declare_function(TyId::SIZE, "main", &[], true).unwrap();
    let at = cx.entry(main).unwrap();
    let three = cx.const_size(main, 3).unwrap();
    let y = cx.declare_local(main, TyId::SIZE, "y", None).unwrap();
    cx.set_future_call(at, y, square, &[three]).unwrap();
    // Nothing is called until the slot is read.
    assert_eq!(call_instructions(cx.module(), main), 0);
    let v = cx.load_value(at, y, false, "v").unwrap();
    cx.ret(at, v).unwrap();

    let module = cx.finish().unwrap();
    assert_eq!(run_main(&module), 9);
}

#[test]
fn future_call_must_return_the_slot_type() {
    let mut cx = cx();
    let flag = cx
        .declare_function(TyId::BOOL, "flag", &[], false)
        .unwrap();
    let main = cx.declare_function(TyId::VOID, "main", &[], true).unwrap();
    let at = cx.entry(main).unwrap();
    let y = cx.declare_local(main, TyId::SIZE, "y", None).unwrap();
    assert!(cx.set_future_call(at, y, flag, &[]).is_err());
    assert!(!cx.local(y).future().is_pending());
}

#[test]
fn operands_observe_pending_writes() {
    let mut cx = cx();
    let i64_ty = cx.types_mut().signed_int(64);
    let main = cx.declare_function(i64_ty, "main", &[], true).unwrap();
    let at = cx.entry(main).unwrap();
    let six = cx.const_int(main, i64_ty, 6).unwrap();
    let seven = cx.const_int(main, i64_ty, 7).unwrap();
    let a = cx.declare_local(main, i64_ty, "a", Some(six)).unwrap();
    let b = cx.declare_local(main, i64_ty, "b", Some(seven)).unwrap();
    // Both operands are storage locals with pending writes.
    let product = cx.binary_op(at, BinaryOp::Mul, a, b, "product").unwrap();
    cx.ret(at, product).unwrap();

    let module = cx.finish().unwrap();
    assert_eq!(run_main(&module), 42);
}

#[test]
fn futures_chain_through_storage() {
    let mut cx = cx();
    let main = cx.declare_function(TyId::SIZE, "main", &[], true).unwrap();
    let at = cx.entry(main).unwrap();
    let five = cx.const_size(main, 5).unwrap();
    let a = cx.declare_local(main, TyId::SIZE, "a", Some(five)).unwrap();
    let b = cx.declare_local(main, TyId::SIZE, "b", None).unwrap();
    // Reading `a` for `b`'s write performs `a`'s own pending write.
    cx.set_future(at, b, a).unwrap();
    assert!(!cx.local(a).future().is_pending());
    assert!(cx.local(b).future().is_pending());
    let v = cx.load_value(at, b, false, "v").unwrap();
    cx.ret(at, v).unwrap();

    let module = cx.finish().unwrap();
    assert_eq!(run_main(&module), 5);
}

#[test]
fn later_stores_to_the_source_do_not_leak_into_the_write() {
    let mut cx = cx();
    let main = cx.declare_function(TyId::SIZE, "main", &[], true).unwrap();
    let at = cx.entry(main).unwrap();
    let five = cx.const_size(main, 5).unwrap();
    let nine = cx.const_size(main, 9).unwrap();
    let a = cx.declare_local(main, TyId::SIZE, "a", Some(five)).unwrap();
    let b = cx.declare_local(main, TyId::SIZE, "b", None).unwrap();
    cx.set_future(at, b, a).unwrap();
    cx.store(at, a, nine).unwrap();
    let v = cx.load_value(at, b, false, "v").unwrap();
    cx.ret(at, v).unwrap();

    let module = cx.finish().unwrap();
    assert_eq!(run_main(&module), 5);
}

#[test]
fn storage_initial_value_is_rejected() {
    let mut cx = cx();
    let main = cx.declare_function(TyId::VOID, "main", &[], true).unwrap();
    let a = cx.declare_local(main, TyId::SIZE, "a", None).unwrap();
    let err = cx.declare_local(main, TyId::SIZE, "b", Some(a)).unwrap_err();
    assert_eq!(err, CodegenError::StorageSource { local: "a".into() });
    assert!(err.to_string().contains("load it before"), "{err}");
}
