#![allow(missing_docs)]

/// Derive input the macros must reject at compile time.
#[test]
fn test_derive_rejects_duplicate_names() {
    let cases = trybuild::TestCases::new();
    cases.compile_fail("tests/ui/duplicate_*.rs");
}
