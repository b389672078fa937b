//! Recursive-descent parser producing an expression AST.
//!
//! The parser mirrors the classic chibicc structure: one helper per
//! precedence level, each folding its operators left to right. The cursor is
//! an explicit `TokenStream` threaded through every helper, so each rule can
//! be exercised on its own.

use std::fmt;

use tracing::{debug, trace};

use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind, describe_token, token_text};

/// Deepest tree the parser will build.
pub const MAX_DEPTH: usize = 256;

/// Binary operators recognised by the language.
///
/// `>` and `>=` have no variant of their own; the parser swaps the operands
/// and produces `Lt` / `Le` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Eq,
  Ne,
  Lt,
  Le,
}

impl BinaryOp {
  pub fn symbol(self) -> &'static str {
    match self {
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
      Self::Eq => "==",
      Self::Ne => "!=",
      Self::Lt => "<",
      Self::Le => "<=",
    }
  }
}

/// Expression tree produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstNode {
  Num {
    value: i64,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<AstNode>,
    rhs: Box<AstNode>,
  },
}

impl AstNode {
  pub fn number(value: i64) -> Self {
    Self::Num { value }
  }

  pub fn binary(op: BinaryOp, lhs: AstNode, rhs: AstNode) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }
}

/// Fully parenthesised rendering, handy in logs and test failures.
impl fmt::Display for AstNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Num { value } => write!(f, "{value}"),
      Self::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
    }
  }
}

/// Parse a complete expression; leftover tokens are an error.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<AstNode> {
  let mut stream = TokenStream::new(tokens, source);

  if stream.is_eof() {
    return Err(CompileError::parse(source, 0, "expression is empty"));
  }

  let node = parse_expr(&mut stream)?;

  if !stream.is_eof() {
    let (loc, got) = stream.describe_current();
    return Err(CompileError::parse(
      source,
      loc,
      format!("unexpected token \"{got}\""),
    ));
  }

  debug!("parsed expression");
  trace!(ast = %node);
  Ok(node)
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<AstNode> {
  parse_equality(stream)
}

fn parse_equality(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let mark = stream.depth;
  let mut node = parse_relational(stream)?;

  loop {
    let op = if stream.equal("==") {
      BinaryOp::Eq
    } else if stream.equal("!=") {
      BinaryOp::Ne
    } else {
      break;
    };
    stream.descend()?;
    node = AstNode::binary(op, node, parse_relational(stream)?);
  }

  stream.depth = mark;
  Ok(node)
}

fn parse_relational(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let mark = stream.depth;
  let mut node = parse_add(stream)?;

  loop {
    // `a > b` is stored as `b < a`, `a >= b` as `b <= a`.
    let (op, swap) = if stream.equal("<") {
      (BinaryOp::Lt, false)
    } else if stream.equal("<=") {
      (BinaryOp::Le, false)
    } else if stream.equal(">") {
      (BinaryOp::Lt, true)
    } else if stream.equal(">=") {
      (BinaryOp::Le, true)
    } else {
      break;
    };
    stream.descend()?;
    let rhs = parse_add(stream)?;
    node = if swap {
      AstNode::binary(op, rhs, node)
    } else {
      AstNode::binary(op, node, rhs)
    };
  }

  stream.depth = mark;
  Ok(node)
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let mark = stream.depth;
  let mut node = parse_mul(stream)?;

  loop {
    let op = if stream.equal("+") {
      BinaryOp::Add
    } else if stream.equal("-") {
      BinaryOp::Sub
    } else {
      break;
    };
    stream.descend()?;
    node = AstNode::binary(op, node, parse_mul(stream)?);
  }

  stream.depth = mark;
  Ok(node)
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let mark = stream.depth;
  let mut node = parse_unary(stream)?;

  loop {
    let op = if stream.equal("*") {
      BinaryOp::Mul
    } else if stream.equal("/") {
      BinaryOp::Div
    } else {
      break;
    };
    stream.descend()?;
    node = AstNode::binary(op, node, parse_unary(stream)?);
  }

  stream.depth = mark;
  Ok(node)
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let mark = stream.depth;

  let node = if stream.equal("+") {
    stream.descend()?;
    parse_unary(stream)?
  } else if stream.equal("-") {
    // -x is lowered to 0 - x
    stream.descend()?;
    let operand = parse_unary(stream)?;
    AstNode::binary(BinaryOp::Sub, AstNode::number(0), operand)
  } else {
    return parse_primary(stream);
  };

  stream.depth = mark;
  Ok(node)
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<AstNode> {
  if stream.equal("(") {
    let mark = stream.depth;
    stream.descend()?;
    let node = parse_expr(stream)?;
    stream.skip(")")?;
    stream.depth = mark;
    return Ok(node);
  }

  let value = stream.get_number()?;
  Ok(AstNode::number(value))
}

/// Index-based cursor over the lexed tokens.
///
/// `depth` counts the tree levels opened by the rules currently on the call
/// stack: one per operator folded into a chain, one per prefix operator and
/// one per parenthesis. Code generation and drop both recurse once per level,
/// so the counter is capped at `MAX_DEPTH`.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
  depth: usize,
}

impl<'a> TokenStream<'a> {
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
      depth: 0,
    }
  }

  /// Open one more tree level, failing once `MAX_DEPTH` is exceeded.
  fn descend(&mut self) -> CompileResult<()> {
    if self.depth >= MAX_DEPTH {
      let (loc, _) = self.describe_current();
      return Err(CompileError::parse(
        self.source,
        loc,
        "expression nested too deeply",
      ));
    }
    self.depth += 1;
    Ok(())
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  /// Offset and printable text of the current token.
  fn describe_current(&self) -> (usize, String) {
    match self.peek() {
      Some(token) => (token.loc, describe_token(Some(token), self.source)),
      None => (self.source.len(), "EOF".to_string()),
    }
  }

  /// Consume the current token if it matches the provided punctuator.
  fn equal(&mut self, op: &str) -> bool {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Punctuator
      && token.len == op.len()
      && token_text(token, self.source) == op
    {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      return Ok(());
    }
    let (loc, got) = self.describe_current();
    Err(CompileError::parse(
      self.source,
      loc,
      format!("expected \"{s}\", but got \"{got}\""),
    ))
  }

  /// Consume the current token as an integer literal.
  fn get_number(&mut self) -> CompileResult<i64> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Num
    {
      let value = token.value.ok_or_else(|| {
        CompileError::parse(
          self.source,
          token.loc,
          "internal error: numeric token missing value",
        )
      })?;
      self.pos += 1;
      return Ok(value);
    }

    let (loc, got) = self.describe_current();
    Err(CompileError::parse(
      self.source,
      loc,
      format!("expected a number, but got \"{got}\""),
    ))
  }

  fn is_eof(&self) -> bool {
    matches!(
      self.peek().map(|token| token.kind),
      Some(TokenKind::Eof) | None
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tokenizer::tokenize;

  fn parse_str(input: &str) -> CompileResult<AstNode> {
    parse(tokenize(input)?, input)
  }

  fn num(value: i64) -> AstNode {
    AstNode::number(value)
  }

  #[test]
  fn single_literal() {
    assert_eq!(parse_str("42").unwrap(), num(42));
  }

  #[test]
  fn multiplication_binds_tighter() {
    let ast = parse_str("2+3*4").unwrap();
    assert_eq!(
      ast,
      AstNode::binary(
        BinaryOp::Add,
        num(2),
        AstNode::binary(BinaryOp::Mul, num(3), num(4))
      )
    );
    assert_eq!(parse_str("(2+3)*4").unwrap().to_string(), "((2 + 3) * 4)");
  }

  #[test]
  fn folds_left() {
    assert_eq!(parse_str("10-2-3").unwrap().to_string(), "((10 - 2) - 3)");
    assert_eq!(parse_str("8/4/2").unwrap().to_string(), "((8 / 4) / 2)");
    assert_eq!(parse_str("1==2!=3").unwrap().to_string(), "((1 == 2) != 3)");
  }

  #[test]
  fn greater_than_swaps_operands() {
    assert_eq!(parse_str("5>3").unwrap(), parse_str("3<5").unwrap());
    assert_eq!(parse_str("5>=3").unwrap(), parse_str("3<=5").unwrap());
    assert_eq!(parse_str("1<2>0").unwrap().to_string(), "(0 < (1 < 2))");
  }

  #[test]
  fn comparison_below_arithmetic() {
    let ast = parse_str("1+1==2*1").unwrap();
    assert_eq!(ast.to_string(), "((1 + 1) == (2 * 1))");
    assert_eq!(parse_str("1<2==1").unwrap().to_string(), "((1 < 2) == 1)");
  }

  #[test]
  fn unary_operators() {
    assert_eq!(parse_str("+7").unwrap(), num(7));
    assert_eq!(parse_str("-5").unwrap().to_string(), "(0 - 5)");
    assert_eq!(parse_str("--5").unwrap().to_string(), "(0 - (0 - 5))");
    assert_eq!(parse_str("-(3+2)").unwrap().to_string(), "(0 - (3 + 2))");
    assert_eq!(parse_str("2*-3").unwrap().to_string(), "(2 * (0 - 3))");
  }

  #[test]
  fn reports_missing_operand() {
    let err = parse_str("1+").unwrap_err();
    assert!(matches!(err, CompileError::Parse { loc: 2, .. }));
    assert_eq!(err.message(), "expected a number, but got \"EOF\"");

    let err = parse_str("1+*2").unwrap_err();
    assert!(matches!(err, CompileError::Parse { loc: 2, .. }));
    assert_eq!(err.message(), "expected a number, but got \"*\"");
  }

  #[test]
  fn reports_unclosed_paren() {
    let err = parse_str("(1+2").unwrap_err();
    assert!(matches!(err, CompileError::Parse { loc: 4, .. }));
    assert_eq!(err.message(), "expected \")\", but got \"EOF\"");
  }

  #[test]
  fn rejects_trailing_tokens() {
    let err = parse_str("1 2").unwrap_err();
    assert!(matches!(err, CompileError::Parse { loc: 2, .. }));
    assert_eq!(err.message(), "unexpected token \"2\"");

    assert!(parse_str("(1))").is_err());
  }

  #[test]
  fn rejects_empty_input() {
    let err = parse_str("   ").unwrap_err();
    assert!(matches!(err, CompileError::Parse { loc: 0, .. }));
    assert_eq!(err.message(), "expression is empty");
  }

  #[test]
  fn accepts_nesting_up_to_limit() {
    let depth = MAX_DEPTH - 1;
    let parens = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(parse_str(&parens).unwrap(), num(1));

    let negations = format!("{}1", "-".repeat(depth));
    assert!(parse_str(&negations).is_ok());

    let chain = format!("1{}", "+1".repeat(depth));
    assert!(parse_str(&chain).is_ok());
  }

  #[test]
  fn rejects_excessive_nesting() {
    let depth = MAX_DEPTH * 40;
    let inputs = [
      format!("{}1{}", "(".repeat(depth), ")".repeat(depth)),
      format!("{}1", "-".repeat(depth)),
      format!("{}1", "+".repeat(depth)),
      format!("1{}", "*1".repeat(depth)),
      format!("1{}", "<1".repeat(depth)),
      format!("{}1{}", "1+(".repeat(depth), ")".repeat(depth)),
    ];

    for input in &inputs {
      let err = parse_str(input).unwrap_err();
      assert!(matches!(err, CompileError::Parse { .. }));
      assert_eq!(err.message(), "expression nested too deeply");
    }
  }

  #[test]
  fn depth_resets_between_siblings() {
    let depth = MAX_DEPTH - 1;
    let group = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
    let input = format!("{group}+{group}");
    assert!(parse_str(&input).is_ok());
  }
}
