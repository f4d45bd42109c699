//! Corpus comparison tests.
//!
//! Each Jack source is compiled and the produced VM text is
//! byte-compared against the reference output; instruction order
//! is significant and downstream tooling is line-diff sensitive.

fn compile(source: &str) -> String {
    match jack::compile_to_string(source) {
        Ok(vm) => vm,
        Err(err) => panic!("{}", err),
    }
}

#[test]
fn test_compile_seven() {
    assert_eq!(
        compile(include_str!("corpus/seven.jack")),
        include_str!("corpus/seven.vm")
    );
}

#[test]
fn test_compile_point() {
    assert_eq!(
        compile(include_str!("corpus/point.jack")),
        include_str!("corpus/point.vm")
    );
}

#[test]
fn test_compile_greeter() {
    assert_eq!(
        compile(include_str!("corpus/greeter.jack")),
        include_str!("corpus/greeter.vm")
    );
}

#[test]
fn test_compile_average() {
    assert_eq!(
        compile(include_str!("corpus/average.jack")),
        include_str!("corpus/average.vm")
    );
}

#[test]
fn test_compilation_is_deterministic() {
    let source = include_str!("corpus/point.jack");
    assert_eq!(compile(source), compile(source));
}
