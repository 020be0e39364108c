//! Bytecode compiler (C10, §4.10): a conservative static compiler over
//! the numeric/primitive-call subset of a stored instruction list.
//! Bails out with `None` the moment it meets a construct outside that
//! subset — list literals, `(...)` variadic calls, user-defined
//! procedures, and quoted words all fall back to the tree-walk
//! evaluator, which stays authoritative (§9) and is always correct;
//! the VM only ever runs what this compiler was willing to accept.

use crate::eval::primitives::PrimitiveRegistry;
use crate::eval::{binding_power, is_infix};
use crate::memory::{Memory, Node};
use crate::token::TokenKind;
use crate::token_source::TokenSource;
use crate::vm::{Chunk, ConstValue, Instruction, Opcode};

/// Compiles a stored instruction list (one `UserProc` body line, or any
/// other node list the evaluator could run) into a [`Chunk`]. Returns
/// `None` if any instruction in it uses a construct this compiler
/// doesn't recognize.
pub fn compile(memory: &Memory, list: Node, primitives: &PrimitiveRegistry) -> Option<Chunk> {
    let mut chunk = Chunk::default();
    let mut source = TokenSource::from_list(list);
    while !source.at_end(memory) {
        compile_instruction(memory, &mut source, primitives, &mut chunk)?;
    }
    Some(chunk)
}

fn compile_instruction(
    memory: &Memory,
    source: &mut TokenSource,
    primitives: &PrimitiveRegistry,
    chunk: &mut Chunk,
) -> Option<()> {
    chunk.code.push(Instruction::new(Opcode::BeginInstr, 0, 0));
    match source.peek(memory).kind {
        TokenKind::Word(name) if primitives.contains(&name) => {
            source.next(memory);
            compile_primitive_call(memory, source, primitives, chunk, &name, true)?;
        }
        _ => compile_expr(memory, source, primitives, chunk, 0)?,
    }
    chunk.code.push(Instruction::new(Opcode::EndInstr, 0, 0));
    Some(())
}

fn compile_expr(
    memory: &Memory,
    source: &mut TokenSource,
    primitives: &PrimitiveRegistry,
    chunk: &mut Chunk,
    min_bp: u8,
) -> Option<()> {
    compile_primary(memory, source, primitives, chunk)?;
    loop {
        let op = match source.peek(memory).kind {
            TokenKind::Operator(ref op) if is_infix(op) => op.clone(),
            _ => return Some(()),
        };
        let bp = binding_power(&op);
        if bp < min_bp {
            return Some(());
        }
        source.next(memory);
        compile_expr(memory, source, primitives, chunk, bp + 1)?;
        chunk.code.push(Instruction::new(op_to_opcode(&op), 0, 0));
    }
}

fn compile_primary(
    memory: &Memory,
    source: &mut TokenSource,
    primitives: &PrimitiveRegistry,
    chunk: &mut Chunk,
) -> Option<()> {
    match source.next(memory).kind {
        TokenKind::Number(n) => {
            push_const_num(chunk, n);
            Some(())
        }
        TokenKind::Colon(name) => {
            push_load_var(chunk, name);
            Some(())
        }
        TokenKind::Operator(op) if op == "unary-" || op == "-" => {
            compile_expr(memory, source, primitives, chunk, 30)?;
            chunk.code.push(Instruction::new(Opcode::Neg, 0, 0));
            Some(())
        }
        TokenKind::Word(name) if primitives.contains(&name) => {
            compile_primitive_call(memory, source, primitives, chunk, &name, false)
        }
        // Quoted words, brackets, parens, user-procedure calls, and
        // anything else: outside this compiler's subset.
        _ => None,
    }
}

fn compile_primitive_call(
    memory: &Memory,
    source: &mut TokenSource,
    primitives: &PrimitiveRegistry,
    chunk: &mut Chunk,
    name: &str,
    is_instr_position: bool,
) -> Option<()> {
    let argc = primitives.default_args(name);
    for _ in 0..argc {
        compile_expr(memory, source, primitives, chunk, 0)?;
    }
    let idx = chunk.constants.len() as u16;
    chunk.constants.push(ConstValue::Name(name.to_string()));
    let op = if is_instr_position { Opcode::CallPrimInstr } else { Opcode::CallPrim };
    chunk.code.push(Instruction::new(op, idx, argc as u16));
    Some(())
}

fn op_to_opcode(op: &str) -> Opcode {
    match op {
        "=" => Opcode::Eq,
        "<" => Opcode::Lt,
        ">" => Opcode::Gt,
        "+" => Opcode::Add,
        "-" => Opcode::Sub,
        "*" => Opcode::Mul,
        "/" => Opcode::Div,
        _ => unreachable!("is_infix admitted an unknown operator"),
    }
}

fn push_const_num(chunk: &mut Chunk, n: f32) {
    let idx = chunk.constants.len() as u16;
    chunk.constants.push(ConstValue::Number(n));
    chunk.code.push(Instruction::new(Opcode::PushConst, idx, 0));
}

fn push_load_var(chunk: &mut Chunk, name: String) {
    let idx = chunk.constants.len() as u16;
    chunk.constants.push(ConstValue::Name(name));
    chunk.code.push(Instruction::new(Opcode::LoadVar, idx, 0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Interpreter;
    use crate::host::NullHost;
    use crate::value::{Status, Value};
    use crate::vm::Vm;

    fn run_line(text: &str) -> Status {
        let mut interp = Interpreter::new();
        let mut host = NullHost::default();
        let mut source = crate::lexer::Lexer::new(text, crate::lexer::Mode::Code);
        let mut tokens = Vec::new();
        loop {
            let tok = source.next();
            if matches!(tok.kind, TokenKind::Eof) {
                break;
            }
            tokens.push(crate::eval::literal_node(&mut interp.memory, &tok.kind));
        }
        let list = interp.memory.cons_list(&tokens);
        let chunk = compile(&interp.memory, list, &interp.primitives).expect("should compile");
        let mut vm = Vm::new();
        vm.run(&mut interp, &mut host, &chunk)
    }

    #[test]
    fn compiles_simple_arithmetic_expression() {
        match run_line("3 + 4 * 2") {
            Status::Ok(Value::Number(n)) => assert_eq!(n, 11.0),
            other => panic!("expected 11, got {other:?}"),
        }
    }

    #[test]
    fn bails_out_on_bracketed_list_literal() {
        let mut interp = Interpreter::new();
        let one = interp.memory.atom_str("1");
        let two = interp.memory.atom_str("2");
        let sub = interp.memory.cons_list(&[one, two]);
        let print_atom = interp.memory.atom_str("print");
        let list = interp.memory.cons_list(&[print_atom, sub]);
        assert!(compile(&interp.memory, list, &interp.primitives).is_none());
    }
}
