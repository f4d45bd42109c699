//! Compiler for the Jack language targeting the Hack virtual
//! machine.
//!
//! One source stream holds exactly one Jack class; compiling it
//! produces the class's VM instruction stream. The pipeline is
//! driven top-down by the [`CompilationEngine`], which pulls tokens
//! from the [`Tokenizer`], resolves names through the
//! [`SymbolTable`] and emits instructions through the [`VmWriter`]
//! in a single pass.
pub mod engine;
pub mod error;
pub mod symbols;
pub mod tokenizer;
pub mod tokens;
pub mod writer;

use std::io::{BufRead, Write};

pub use self::{
    engine::CompilationEngine,
    error::{CompileError, JackError, JackResult},
    symbols::{SymbolKind, SymbolTable},
    tokenizer::Tokenizer,
    tokens::{Keyword, Token, TokenKind},
    writer::{Command, Segment, VmWriter},
};

/// Version of *this* implementation.
pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compiles one Jack class from `input`, writing the VM instruction
/// stream to `output`.
pub fn compile(input: impl BufRead, output: impl Write) -> JackResult<()> {
    CompilationEngine::new(input, output)?.compile_class()
}

/// Compiles a single class held in memory, returning the VM text.
pub fn compile_to_string(source: &str) -> JackResult<String> {
    let mut buffer = Vec::new();
    compile(source.as_bytes(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
