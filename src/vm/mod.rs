//! Bytecode & VM (C10, §4.10): a minimal accelerator for expressions
//! and instruction sequences the compiler recognizes. The tree-walk
//! evaluator ([`crate::eval`]) remains authoritative (§9's open
//! question) — any construct the compiler doesn't handle falls back
//! to it, and the VM must never diverge from tree-walk results for
//! what it does compile.

pub mod compiler;

use crate::config::VM_STACK_SIZE;
use crate::error::{ErrorKind, RuntimeError};
use crate::eval::{bool_word, require_number, Interpreter};
use crate::host::Host;
use crate::value::{Status, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Opcode {
    Nop,
    PushConst,
    LoadVar,
    CallPrim,
    CallPrimInstr,
    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Lt,
    Gt,
    BeginInstr,
    EndInstr,
}

/// One instruction: a fixed `{ opcode, a, b }` triple (§4.10). `a`
/// indexes the constant pool; `b` is an argument count where relevant.
#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    pub op: Opcode,
    pub a: u16,
    pub b: u16,
}

impl Instruction {
    pub fn new(op: Opcode, a: u16, b: u16) -> Self {
        Instruction { op, a, b }
    }
}

/// A compiled unit: instructions plus the constant pool they index.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub code: Vec<Instruction>,
    pub constants: Vec<ConstValue>,
}

/// A VM constant-pool entry. Names are stored separately from numbers
/// so `LOAD_VAR`/`CALL_PRIM` can address them without re-interning a
/// fresh atom on every execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Number(f32),
    Name(String),
}

pub struct Vm {
    stack: Vec<Value>,
}

impl Default for Vm {
    fn default() -> Self {
        Vm { stack: Vec::with_capacity(VM_STACK_SIZE) }
    }
}

impl Vm {
    pub fn new() -> Self {
        Vm::default()
    }

    fn push(&mut self, v: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= VM_STACK_SIZE {
            return Err(RuntimeError::new(ErrorKind::OutOfSpace));
        }
        self.stack.push(v);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or(Value::None)
    }

    /// Runs a chunk to completion and returns its final status. A
    /// `CALL_PRIM` temporarily disables CPS (mirrors the evaluator's
    /// `primitive_arg_depth` guard) by never emitting `Status::Call`
    /// from within this loop — the VM's subset never compiles
    /// tail-call sites, by construction of the compiler (§4.10).
    pub fn run(&mut self, interp: &mut Interpreter, host: &mut dyn Host, chunk: &Chunk) -> Status {
        self.stack.clear();
        let mut in_tail_position = false;
        for instr in &chunk.code {
            match instr.op {
                Opcode::Nop => {}
                Opcode::PushConst => {
                    let ConstValue::Number(n) = &chunk.constants[instr.a as usize] else {
                        return Status::Error(RuntimeError::new(ErrorKind::DontKnowHow));
                    };
                    if let Err(e) = self.push(Value::Number(*n)) {
                        return Status::Error(e);
                    }
                }
                Opcode::LoadVar => {
                    let ConstValue::Name(name) = &chunk.constants[instr.a as usize] else {
                        return Status::Error(RuntimeError::new(ErrorKind::DontKnowHow));
                    };
                    match interp.frames.find_binding_in_chain(name).or_else(|| interp.vars.get(name)) {
                        Some(v) => {
                            if let Err(e) = self.push(v) {
                                return Status::Error(e);
                            }
                        }
                        None => return Status::Error(RuntimeError::with_arg(ErrorKind::NoValue, "thing", name.clone())),
                    }
                }
                Opcode::CallPrim | Opcode::CallPrimInstr => {
                    let ConstValue::Name(name) = chunk.constants[instr.a as usize].clone() else {
                        return Status::Error(RuntimeError::new(ErrorKind::DontKnowHow));
                    };
                    let argc = instr.b as usize;
                    if self.stack.len() < argc {
                        return Status::Error(RuntimeError::with_proc(ErrorKind::NotEnoughInputs, name));
                    }
                    let args = self.stack.split_off(self.stack.len() - argc);
                    let Some(entry) = interp.primitives.lookup(&name) else {
                        return Status::Error(RuntimeError::with_arg(ErrorKind::DontKnowHow, "run", name));
                    };
                    match (entry.func)(interp, host, args) {
                        Status::Ok(v) => {
                            if instr.op == Opcode::CallPrimInstr {
                                if !v.is_none() {
                                    return Status::Error(RuntimeError::dont_know_what_to_do_with(&interp.memory, v));
                                }
                            } else if let Err(e) = self.push(v) {
                                return Status::Error(e);
                            }
                        }
                        other => return other,
                    }
                }
                Opcode::Neg => {
                    let v = self.pop();
                    match require_number(&interp.memory, "minus", v) {
                        Ok(n) => {
                            if let Err(e) = self.push(Value::Number(-n)) {
                                return Status::Error(e);
                            }
                        }
                        Err(e) => return Status::Error(e),
                    }
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    let b = self.pop();
                    let a = self.pop();
                    match arith(&interp.memory, instr.op, a, b) {
                        Ok(v) => {
                            if let Err(e) = self.push(v) {
                                return Status::Error(e);
                            }
                        }
                        Err(e) => return Status::Error(e),
                    }
                }
                Opcode::Eq => {
                    let b = self.pop();
                    let a = self.pop();
                    let eq = a.equals(&b, &interp.memory);
                    if let Err(e) = self.push(bool_word(&mut interp.memory, eq)) {
                        return Status::Error(e);
                    }
                }
                Opcode::Lt | Opcode::Gt => {
                    let b = self.pop();
                    let a = self.pop();
                    match compare(&interp.memory, instr.op, a, b) {
                        Ok(v) => {
                            if let Err(e) = self.push(bool_word(&mut interp.memory, v)) {
                                return Status::Error(e);
                            }
                        }
                        Err(e) => return Status::Error(e),
                    }
                }
                Opcode::BeginInstr => in_tail_position = instr.a != 0,
                Opcode::EndInstr => {
                    if !self.stack.is_empty() {
                        let v = self.pop();
                        return Status::Error(RuntimeError::dont_know_what_to_do_with(&interp.memory, v));
                    }
                }
            }
        }
        let _ = in_tail_position;
        match self.stack.pop() {
            Some(v) => Status::Ok(v),
            None => Status::None,
        }
    }
}

fn arith(memory: &crate::memory::Memory, op: Opcode, a: Value, b: Value) -> Result<Value, RuntimeError> {
    let name = match op {
        Opcode::Add => "sum",
        Opcode::Sub => "difference",
        Opcode::Mul => "product",
        Opcode::Div => "quotient",
        _ => unreachable!(),
    };
    let a = require_number(memory, name, a)?;
    let b = require_number(memory, name, b)?;
    match op {
        Opcode::Add => Ok(Value::Number(a + b)),
        Opcode::Sub => Ok(Value::Number(a - b)),
        Opcode::Mul => Ok(Value::Number(a * b)),
        Opcode::Div => {
            if b == 0.0 {
                Err(RuntimeError::new(ErrorKind::DivideByZero))
            } else {
                Ok(Value::Number(a / b))
            }
        }
        _ => unreachable!(),
    }
}

fn compare(memory: &crate::memory::Memory, op: Opcode, a: Value, b: Value) -> Result<bool, RuntimeError> {
    let name = if op == Opcode::Lt { "lessp" } else { "greaterp" };
    let a = require_number(memory, name, a)?;
    let b = require_number(memory, name, b)?;
    Ok(if op == Opcode::Lt { a < b } else { a > b })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;

    fn push_num(chunk: &mut Chunk, n: f32) {
        let idx = chunk.constants.len() as u16;
        chunk.constants.push(ConstValue::Number(n));
        chunk.code.push(Instruction::new(Opcode::PushConst, idx, 0));
    }

    #[test]
    fn arithmetic_chunk_computes_sum() {
        let mut interp = Interpreter::new();
        let mut host = NullHost::default();
        let mut chunk = Chunk::default();
        push_num(&mut chunk, 3.0);
        push_num(&mut chunk, 4.0);
        chunk.code.push(Instruction::new(Opcode::Add, 0, 0));
        let mut vm = Vm::new();
        match vm.run(&mut interp, &mut host, &chunk) {
            Status::Ok(Value::Number(n)) => assert_eq!(n, 7.0),
            other => panic!("expected 7, got {other:?}"),
        }
    }

    #[test]
    fn division_by_zero_is_reported() {
        let mut interp = Interpreter::new();
        let mut host = NullHost::default();
        let mut chunk = Chunk::default();
        push_num(&mut chunk, 5.0);
        push_num(&mut chunk, 0.0);
        chunk.code.push(Instruction::new(Opcode::Div, 0, 0));
        let mut vm = Vm::new();
        match vm.run(&mut interp, &mut host, &chunk) {
            Status::Error(e) => assert_eq!(e.message(), "Can't divide by zero"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn empty_chunk_produces_none() {
        let mut interp = Interpreter::new();
        let mut host = NullHost::default();
        let chunk = Chunk::default();
        let mut vm = Vm::new();
        assert!(matches!(vm.run(&mut interp, &mut host, &chunk), Status::None));
    }
}
