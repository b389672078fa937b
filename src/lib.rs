//! Crate root: wires together the compilation pipeline.
//!
//! The stages are intentionally small and run strictly one after another:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns the expression AST.
//! - `codegen` lowers the AST into a stack-machine `Program` for x86-64.
//! - `error` centralises reporting utilities shared by the other modules.

pub mod codegen;
pub mod error;
pub mod parser;
pub mod tokenizer;

pub use codegen::Program;
pub use error::{CompileError, CompileResult};

/// Compile an expression into its instruction list.
pub fn compile(expr: &str) -> CompileResult<Program> {
  let tokens = tokenizer::tokenize(expr)?;
  let ast = parser::parse(tokens, expr)?;
  Ok(codegen::generate(&ast))
}

/// Compile an expression into Intel-syntax assembly text.
pub fn generate_assembly(expr: &str) -> CompileResult<String> {
  Ok(compile(expr)?.to_string())
}
