//! Lexer for the expression language.
//!
//! Only two kinds of lexeme exist, punctuators and decimal integers. The
//! two-byte operators are tried first, otherwise `>=` would come out as `>`
//! followed by a stray `=`.

use tracing::{debug, trace};

use crate::error::{CompileError, CompileResult};

const MULTI_CHAR_PUNCTUATORS: [&str; 4] = ["==", "!=", "<=", ">="];

/// What a token is; the literal value, if any, lives on `Token`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Punctuator,
  Num,
  Eof,
}

/// A lexeme with its byte span in the source. `value` is set only for `Num`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<i64>,
  pub loc: usize,
  pub len: usize,
}

impl Token {
  pub fn new(kind: TokenKind, loc: usize, len: usize, value: Option<i64>) -> Self {
    Self {
      kind,
      value,
      loc,
      len,
    }
  }
}

/// Split `input` into tokens. The result always ends with exactly one `Eof`.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];
    // Same set as C's isspace, which also covers vertical tab.
    if c.is_ascii_whitespace() || c == b'\x0b' {
      i += 1;
      continue;
    }

    if let Some(op) = MULTI_CHAR_PUNCTUATORS
      .into_iter()
      .find(|op| input[i..].starts_with(op))
    {
      tokens.push(Token::new(TokenKind::Punctuator, i, op.len(), None));
      i += op.len();
      continue;
    }

    if matches!(c, b'+' | b'-' | b'*' | b'/' | b'(' | b')' | b'<' | b'>') {
      tokens.push(Token::new(TokenKind::Punctuator, i, 1, None));
      i += 1;
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      let text = &input[start..i];
      let value = text
        .parse::<i64>()
        .map_err(|err| CompileError::lex(input, start, format!("invalid number: {err}")))?;
      tokens.push(Token::new(TokenKind::Num, start, i - start, Some(value)));
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    let message = if invalid_char.is_ascii_alphabetic() {
      "expected a number".to_string()
    } else {
      format!("invalid token: '{invalid_char}'")
    };
    return Err(CompileError::lex(input, i, message));
  }

  tokens.push(Token::new(TokenKind::Eof, input.len(), 0, None));
  debug!(count = tokens.len(), "tokenized input");
  trace!(?tokens);
  Ok(tokens)
}

/// Source text covered by `token`; empty for `Eof`.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// How a token is quoted in error messages.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  match token {
    Some(t) => match t.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ => token_text(t, source).to_string(),
    },
    None => "EOF".to_string(),
  }
}
