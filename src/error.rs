//! Shared error utilities used across the compilation pipeline.
//!
//! Diagnostics are kept lightweight on purpose: lexer and parser failures
//! echo the source line and point at the offending byte with a caret.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(display("usage: {program} <expr>"))]
  Usage { program: String },

  #[snafu(display("{}", caret_diagnostic(input, *loc, message)))]
  Lex {
    input: String,
    loc: usize,
    message: String,
  },

  #[snafu(display("{}", caret_diagnostic(input, *loc, message)))]
  Parse {
    input: String,
    loc: usize,
    message: String,
  },
}

impl CompileError {
  /// Lexical failure anchored at byte offset `loc` of `input`.
  pub fn lex(input: &str, loc: usize, message: impl Into<String>) -> Self {
    Self::Lex {
      input: input.to_string(),
      loc,
      message: message.into(),
    }
  }

  /// Syntax failure anchored at byte offset `loc` of `input`.
  pub fn parse(input: &str, loc: usize, message: impl Into<String>) -> Self {
    Self::Parse {
      input: input.to_string(),
      loc,
      message: message.into(),
    }
  }

  pub fn loc(&self) -> Option<usize> {
    match self {
      Self::Usage { .. } => None,
      Self::Lex { loc, .. } | Self::Parse { loc, .. } => Some(*loc),
    }
  }

  pub fn message(&self) -> String {
    match self {
      Self::Usage { .. } => self.to_string(),
      Self::Lex { message, .. } | Self::Parse { message, .. } => message.clone(),
    }
  }
}

/// Render `input` followed by a caret under byte offset `loc` and `message`.
///
/// Out-of-range offsets are clamped to the end of the input. The caret column
/// is counted in characters so multi-byte input still lines up.
pub fn caret_diagnostic(input: &str, loc: usize, message: &str) -> String {
  let mut safe_loc = loc.min(input.len());
  while !input.is_char_boundary(safe_loc) {
    safe_loc -= 1;
  }
  let column = input[..safe_loc].chars().count();
  format!("{input}\n{}^ {message}", " ".repeat(column))
}
