#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use rustc_hash::FxHashMap;

use super::*;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: FxHashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn options_default_to_host_with_verification() {
    let options = CodegenOptions::from_lookup(lookup(&[]));
    assert_eq!(options, CodegenOptions::default());
    assert_eq!(options.target_triple, None);
    assert!(options.verify_functions);
    assert!(!options.dump_ir);
}

#[test]
fn options_read_environment_overrides() {
    let options = CodegenOptions::from_lookup(lookup(&[
        ("DRAKE_TARGET", "aarch64-apple-darwin"),
        ("DRAKE_VERIFY", "0"),
        ("DRAKE_DUMP_IR", "1"),
    ]));
    assert_eq!(options.target_triple.as_deref(), Some("aarch64-apple-darwin"));
    assert!(!options.verify_functions);
    assert!(options.dump_ir);
}

#[test]
fn off_values_are_case_insensitive() {
    for off in ["0", "false", "OFF", " no "] {
        let options = CodegenOptions::from_lookup(lookup(&[
            ("DRAKE_VERIFY", off),
            ("DRAKE_DUMP_IR", off),
        ]));
        assert!(!options.verify_functions, "{off:?}");
        assert!(!options.dump_ir, "{off:?}");
    }
    let options = CodegenOptions::from_lookup(lookup(&[("DRAKE_DUMP_IR", "")]));
    assert!(!options.dump_ir);
}

#[test]
fn empty_target_selects_host() {
    let options = CodegenOptions::from_lookup(lookup(&[("DRAKE_TARGET", "")]));
    assert_eq!(options.target_triple, None);
}

#[test]
fn with_target_overrides_environment() {
    let options = CodegenOptions::from_lookup(lookup(&[("DRAKE_TARGET", "aarch64-apple-darwin")]))
        .with_target("x86_64-unknown-linux-gnu");
    assert_eq!(
        options.target_triple.as_deref(),
        Some("x86_64-unknown-linux-gnu")
    );
}

#[test]
fn error_messages() {
    let cases = [
        (
            CodegenError::InvalidOperands {
                op: "+",
                lhs: "i32".into(),
                rhs: "f64".into(),
            },
            "invalid operands to `+`: `i32` and `f64`",
        ),
        (
            CodegenError::FieldOutOfRange {
                structure: "Point".into(),
                index: 3,
                count: 2,
            },
            "field 3 out of range for struct `Point` (2 fields)",
        ),
        (
            CodegenError::InvalidFloatWidth(8),
            "invalid float width 8 (expected 16, 32 or 64)",
        ),
        (
            CodegenError::NotStorage { local: "x".into() },
            "`x` is not backed by storage",
        ),
        (
            CodegenError::StorageSource { local: "slot".into() },
            "`slot` is backed by storage; load it before deferring a write of it",
        ),
        (
            CodegenError::MissingBody("malloc".into()),
            "`malloc` is a declaration and has no body",
        ),
    ];
    for (error, message) in cases {
        assert_eq!(error.to_string(), message);
    }
}

#[test]
fn ir_errors_pass_through() {
    let error = CodegenError::from(drake_ir::IrError::DuplicateFunction("f".into()));
    assert_eq!(
        error.to_string(),
        drake_ir::IrError::DuplicateFunction("f".into()).to_string()
    );
}

#[test]
fn init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}
