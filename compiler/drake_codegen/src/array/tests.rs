#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;

use drake_ir::{types, IrError, IrType};

use super::*;
use crate::options::CodegenOptions;

fn cx() -> CodegenCx {
    CodegenCx::new(
        "arrays",
        CodegenOptions::default().with_target("x86_64-unknown-linux-gnu"),
    )
    .unwrap()
}

#[test]
fn declares_struct_and_sixteen_members() {
    let mut cx = cx();
    let i32_ty = cx.types_mut().signed_int(32);
    let array = Array::create(&mut cx, i32_ty, "IntArray").unwrap();

    let def = cx.structure(array.structure());
    assert_eq!(def.name(), "IntArray");
    assert_eq!(
        def.elements(),
        &[array.buffer_ty(), TyId::SIZE, TyId::SIZE, TyId::SIZE]
    );
    assert_eq!(cx.types().pointee(array.buffer_ty()), Some(i32_ty));

    let m = array.methods();
    let members = [
        (m.get_buffer, "get_buffer"),
        (m.set_buffer, "set_buffer"),
        (m.get_size, "get_size"),
        (m.set_size, "set_size"),
        (m.get_max, "get_max"),
        (m.set_max, "set_max"),
        (m.get_factor, "get_factor"),
        (m.set_factor, "set_factor"),
        (m.constructor, "constructor"),
        (m.constructor_size, "constructor_size"),
        (m.constructor_copy, "constructor_copy"),
        (m.destructor, "destructor"),
        (m.resize, "resize"),
        (m.is_valid_index, "is_valid_index"),
        (m.get_at_index, "get_at_index"),
        (m.set_at_index, "set_at_index"),
    ];
    let this = def.ptr_ty();
    assert_eq!(
        members.map(|(_, method)| method),
        Array::METHOD_NAMES,
        "generated members and the up-front name check must agree"
    );
    for (id, method) in members {
        let func = cx.func(id);
        assert_eq!(func.name(), format!("IntArray_{method}"));
        assert_eq!(func.param_types()[0], this, "{method}");
        assert!(!func.is_declaration());
    }

    assert_eq!(cx.func(m.get_at_index).ret(), i32_ty);
    assert_eq!(cx.func(m.is_valid_index).ret(), TyId::BOOL);
    assert_eq!(
        cx.func(m.set_at_index).param_types(),
        &[this, TyId::SIZE, i32_ty]
    );
    assert_eq!(cx.func(m.get_buffer).ret(), array.buffer_ty());
    cx.verify_module().unwrap();
}

#[test]
fn heap_functions_are_shared_between_arrays() {
    let mut cx = cx();
    let f64_ty = cx.types_mut().float(64).unwrap();
    let u8_ty = cx.types_mut().int(8);
    Array::create(&mut cx, f64_ty, "FloatArray").unwrap();
    Array::create(&mut cx, u8_ty, "ByteArray").unwrap();

    let module = cx.finish().unwrap();
    for name in ["malloc", "free", "memcpy"] {
        let count = module.functions().filter(|(_, f)| f.name == name).count();
        assert_eq!(count, 1, "{name}");
    }
    let malloc = module.function_by_name("malloc").unwrap();
    assert_eq!(
        module.function(malloc).params,
        vec![IrType::Scalar(types::I64)]
    );
    assert_eq!(module.function(malloc).ret, IrType::Scalar(types::I64));
}

#[test]
fn struct_elements_are_rejected_but_struct_pointers_work() {
    let mut cx = cx();
    let f32_ty = cx.types_mut().float(32).unwrap();
    let pair = cx.declare_struct("Pair", &[f32_ty, f32_ty]).unwrap();
    let pair_ty = cx.structure(pair).ty();
    let functions = cx.module().functions().count();

    let err = Array::create(&mut cx, pair_ty, "PairArray").unwrap_err();
    assert!(matches!(err, CodegenError::TypeMismatch { .. }), "{err}");
    assert!(cx.struct_by_name("PairArray").is_none());
    assert_eq!(cx.module().functions().count(), functions);

    let pair_ptr = cx.structure(pair).ptr_ty();
    let array = Array::create(&mut cx, pair_ptr, "PairPtrArray").unwrap();
    assert_eq!(cx.types().stride_of(pair_ptr), 8);
    assert_eq!(cx.types().pointee(array.buffer_ty()), Some(pair_ptr));
}

#[test]
fn void_elements_are_rejected() {
    let mut cx = cx();
    assert_eq!(
        Array::create(&mut cx, TyId::VOID, "Nothing"),
        Err(CodegenError::TypeMismatch {
            expected: "a sized element type".into(),
            found: "void".into()
        })
    );
    assert!(cx.struct_by_name("Nothing").is_none());
}

#[test]
fn second_array_with_same_name_fails() {
    let mut cx = cx();
    let i32_ty = cx.types_mut().signed_int(32);
    Array::create(&mut cx, i32_ty, "IntArray").unwrap();
    assert_eq!(
        Array::create(&mut cx, i32_ty, "IntArray"),
        Err(CodegenError::Ir(IrError::DuplicateFunction(
            "IntArray_get_buffer".into()
        )))
    );
}

#[test]
fn taken_member_name_leaves_module_untouched() {
    let mut cx = cx();
    let i32_ty = cx.types_mut().signed_int(32);
    cx.declare_function(TyId::VOID, "IntArray_resize", &[], false)
        .unwrap();
    let before = cx.dump_ir();

    assert_eq!(
        Array::create(&mut cx, i32_ty, "IntArray"),
        Err(CodegenError::Ir(IrError::DuplicateFunction(
            "IntArray_resize".into()
        )))
    );
    assert_eq!(cx.dump_ir(), before);
    assert!(cx.struct_by_name("IntArray").is_none());
    assert!(cx.function_by_name("IntArray_get_buffer").is_none());
}
