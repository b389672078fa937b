//! Stack-machine simulator for generated programs.
//!
//! Executes the instruction list the way the CPU would, so the semantics of
//! the compiler can be checked without assembling anything.

use exprcc::Program;
use exprcc::codegen::{Cond, Inst, Reg};

#[derive(Debug, Default)]
struct Machine {
  rax: i64,
  rdi: i64,
  rdx: i64,
  stack: Vec<i64>,
  flags: Option<(i64, i64)>,
}

impl Machine {
  fn get(&self, reg: Reg) -> i64 {
    match reg {
      Reg::Rax => self.rax,
      Reg::Rdi => self.rdi,
      Reg::Al => self.rax & 0xff,
    }
  }

  fn set(&mut self, reg: Reg, value: i64) {
    match reg {
      Reg::Rax => self.rax = value,
      Reg::Rdi => self.rdi = value,
      Reg::Al => self.rax = (self.rax & !0xff) | (value & 0xff),
    }
  }

  fn pop(&mut self) -> i64 {
    self.stack.pop().expect("pop from empty stack")
  }
}

/// Run `program` and return `rax` at `ret`. Panics if the stack is unbalanced.
pub fn run(program: &Program) -> i64 {
  let mut m = Machine::default();

  for inst in &program.insts {
    match *inst {
      Inst::PushImm(value) => m.stack.push(i64::from(value)),
      Inst::Push(reg) => {
        let value = m.get(reg);
        m.stack.push(value);
      }
      Inst::Pop(reg) => {
        let value = m.pop();
        m.set(reg, value);
      }
      Inst::MovImm(reg, value) => m.set(reg, value),
      Inst::Add(dst, src) => {
        let value = m.get(dst).wrapping_add(m.get(src));
        m.set(dst, value);
      }
      Inst::Sub(dst, src) => {
        let value = m.get(dst).wrapping_sub(m.get(src));
        m.set(dst, value);
      }
      Inst::Imul(dst, src) => {
        let value = m.get(dst).wrapping_mul(m.get(src));
        m.set(dst, value);
      }
      Inst::Cqo => m.rdx = if m.rax < 0 { -1 } else { 0 },
      Inst::Idiv(reg) => {
        let divisor = m.get(reg);
        assert_eq!(m.rdx, if m.rax < 0 { -1 } else { 0 }, "idiv without cqo");
        let (quot, rem) = (m.rax.wrapping_div(divisor), m.rax.wrapping_rem(divisor));
        m.rax = quot;
        m.rdx = rem;
      }
      Inst::Cmp(lhs, rhs) => m.flags = Some((m.get(lhs), m.get(rhs))),
      Inst::Set(cond, reg) => {
        let (a, b) = m.flags.expect("setcc without cmp");
        let hit = match cond {
          Cond::E => a == b,
          Cond::Ne => a != b,
          Cond::L => a < b,
          Cond::Le => a <= b,
        };
        m.set(reg, i64::from(hit));
      }
      Inst::Movzb(dst, src) => {
        let value = m.get(src) & 0xff;
        m.set(dst, value);
      }
      Inst::Ret => {
        assert!(m.stack.is_empty(), "stack not balanced: {:?}", m.stack);
        return m.rax;
      }
    }
  }

  panic!("program fell off the end without ret");
}
