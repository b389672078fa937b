//! Code generation: lower the parsed AST into Intel-syntax x86-64 assembly.
//!
//! The emitter uses a simple stack machine: every expression leaves a single
//! value on the stack. Instructions are collected into a `Program` first and
//! only turned into text by its `Display` impl.

use std::fmt;

use tracing::debug;

use crate::parser::{AstNode, BinaryOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
  Rax,
  Rdi,
  Al,
}

impl fmt::Display for Reg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Rax => "rax",
      Self::Rdi => "rdi",
      Self::Al => "al",
    })
  }
}

/// Condition codes used by `setcc` after a `cmp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
  E,
  Ne,
  L,
  Le,
}

impl fmt::Display for Cond {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::E => "e",
      Self::Ne => "ne",
      Self::L => "l",
      Self::Le => "le",
    })
  }
}

/// One machine instruction. Two-operand forms are `dst, src`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inst {
  /// `push imm`; the immediate must fit in a sign-extended 32 bits.
  PushImm(i32),
  Push(Reg),
  Pop(Reg),
  MovImm(Reg, i64),
  Add(Reg, Reg),
  Sub(Reg, Reg),
  Imul(Reg, Reg),
  /// Sign-extend `rax` into `rdx:rax`.
  Cqo,
  Idiv(Reg),
  Cmp(Reg, Reg),
  Set(Cond, Reg),
  Movzb(Reg, Reg),
  Ret,
}

impl fmt::Display for Inst {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::PushImm(value) => write!(f, "push {value}"),
      Self::Push(reg) => write!(f, "push {reg}"),
      Self::Pop(reg) => write!(f, "pop {reg}"),
      Self::MovImm(reg, value) => write!(f, "mov {reg}, {value}"),
      Self::Add(dst, src) => write!(f, "add {dst}, {src}"),
      Self::Sub(dst, src) => write!(f, "sub {dst}, {src}"),
      Self::Imul(dst, src) => write!(f, "imul {dst}, {src}"),
      Self::Cqo => f.write_str("cqo"),
      Self::Idiv(reg) => write!(f, "idiv {reg}"),
      Self::Cmp(lhs, rhs) => write!(f, "cmp {lhs}, {rhs}"),
      Self::Set(cond, reg) => write!(f, "set{cond} {reg}"),
      Self::Movzb(dst, src) => write!(f, "movzb {dst}, {src}"),
      Self::Ret => f.write_str("ret"),
    }
  }
}

/// The generated body of `main`, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
  pub insts: Vec<Inst>,
}

impl Program {
  fn emit(&mut self, inst: Inst) {
    self.insts.push(inst);
  }
}

/// Serialises the whole assembly file, preamble included.
impl fmt::Display for Program {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, ".intel_syntax noprefix")?;
    writeln!(f, ".globl main")?;
    writeln!(f, "main:")?;
    for inst in &self.insts {
      writeln!(f, "  {inst}")?;
    }
    Ok(())
  }
}

/// Emit the program computing `node` and returning it in `rax`.
pub fn generate(node: &AstNode) -> Program {
  let mut program = Program::default();
  emit_expr(node, &mut program);

  // The whole expression's value is the only thing left on the stack.
  program.emit(Inst::Pop(Reg::Rax));
  program.emit(Inst::Ret);

  debug!(count = program.insts.len(), "generated instructions");
  program
}

/// Emit stack-based code for a single expression node.
fn emit_expr(node: &AstNode, program: &mut Program) {
  match node {
    AstNode::Num { value } => match i32::try_from(*value) {
      Ok(imm) => program.emit(Inst::PushImm(imm)),
      Err(_) => {
        program.emit(Inst::MovImm(Reg::Rax, *value));
        program.emit(Inst::Push(Reg::Rax));
      }
    },
    AstNode::Binary { op, lhs, rhs } => {
      emit_expr(lhs, program);
      emit_expr(rhs, program);
      program.emit(Inst::Pop(Reg::Rdi));
      program.emit(Inst::Pop(Reg::Rax));
      match op {
        BinaryOp::Add => program.emit(Inst::Add(Reg::Rax, Reg::Rdi)),
        BinaryOp::Sub => program.emit(Inst::Sub(Reg::Rax, Reg::Rdi)),
        BinaryOp::Mul => program.emit(Inst::Imul(Reg::Rax, Reg::Rdi)),
        BinaryOp::Div => {
          program.emit(Inst::Cqo);
          program.emit(Inst::Idiv(Reg::Rdi));
        }
        BinaryOp::Eq => emit_compare(Cond::E, program),
        BinaryOp::Ne => emit_compare(Cond::Ne, program),
        BinaryOp::Lt => emit_compare(Cond::L, program),
        BinaryOp::Le => emit_compare(Cond::Le, program),
      }
      program.emit(Inst::Push(Reg::Rax));
    }
  }
}

fn emit_compare(cond: Cond, program: &mut Program) {
  program.emit(Inst::Cmp(Reg::Rax, Reg::Rdi));
  program.emit(Inst::Set(cond, Reg::Al));
  program.emit(Inst::Movzb(Reg::Rax, Reg::Al));
}
