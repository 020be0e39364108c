//! Turns accumulated REPL text into the arena node lists `UserProc`
//! bodies and stored instruction lines are made of (§4.8's persisted
//! form). A single logical instruction line may span several physical
//! lines when brackets opened on one line close on a later one; the
//! physical breaks between them are preserved as [`Node::NEWLINE`]
//! markers, exactly like [`crate::eval::build_list_literal`] preserves
//! them for list literals parsed in one shot from text.

use crate::error::{ErrorKind, RuntimeError};
use crate::eval::literal_node;
use crate::lexer::{Lexer, Mode};
use crate::memory::{Memory, Node};
use crate::token::TokenKind;

/// Counts `[` minus `]` in a line of raw text — used by the REPL to
/// decide whether an instruction needs another physical line before
/// it's complete. Deliberately bracket-naive about quoting, matching
/// the line-oriented accumulation the spec describes.
pub fn bracket_delta(line: &str) -> i32 {
    line.bytes().fold(0i32, |acc, b| match b {
        b'[' => acc + 1,
        b']' => acc - 1,
        _ => acc,
    })
}

/// Walks a sequence of physical-line segments (already lexed
/// independently since the character-stream lexer doesn't span `&str`
/// boundaries), building one flat node list per logical line and real
/// sublist nodes for bracketed groups, with a `Node::NEWLINE` marker
/// dropped in at every segment boundary crossed along the way.
struct SegmentCursor<'a> {
    segments: &'a [&'a str],
    idx: usize,
    lexer: Lexer<'a>,
}

enum SegTok {
    Real(TokenKind),
    LineBreak,
    End,
}

impl<'a> SegmentCursor<'a> {
    fn new(segments: &'a [&'a str]) -> Self {
        let lexer = Lexer::new(segments.first().copied().unwrap_or(""), Mode::Code);
        SegmentCursor { segments, idx: 0, lexer }
    }

    fn next_tok(&mut self) -> SegTok {
        let tok = self.lexer.next();
        if matches!(tok.kind, TokenKind::Eof) {
            if self.idx + 1 < self.segments.len() {
                self.idx += 1;
                self.lexer = Lexer::new(self.segments[self.idx], Mode::Code);
                return SegTok::LineBreak;
            }
            return SegTok::End;
        }
        SegTok::Real(tok.kind)
    }
}

fn parse_seq(memory: &mut Memory, cur: &mut SegmentCursor, in_bracket: bool) -> Result<Vec<Node>, RuntimeError> {
    let mut items = Vec::new();
    loop {
        match cur.next_tok() {
            SegTok::End => {
                if in_bracket {
                    return Err(RuntimeError::new(ErrorKind::BracketMismatch));
                }
                return Ok(items);
            }
            SegTok::LineBreak => items.push(Node::NEWLINE),
            SegTok::Real(TokenKind::RBracket) => {
                if in_bracket {
                    return Ok(items);
                }
                return Err(RuntimeError::new(ErrorKind::BracketMismatch));
            }
            SegTok::Real(TokenKind::LBracket) => {
                let sub = parse_seq(memory, cur, true)?;
                items.push(memory.cons_list(&sub));
            }
            SegTok::Real(kind) => items.push(literal_node(memory, &kind)),
        }
    }
}

/// Parses one logical instruction line (possibly joined from several
/// physical lines by embedded `\n`) into the arena node list the
/// evaluator's node-iterator walks.
pub fn parse_instruction_line(memory: &mut Memory, full_text: &str) -> Result<Node, RuntimeError> {
    let segments: Vec<&str> = full_text.split('\n').collect();
    let mut cur = SegmentCursor::new(&segments);
    let items = parse_seq(memory, &mut cur, false)?;
    Ok(memory.cons_list(&items))
}

/// Parses a `to <name> [:p1 [:p2 ...]]` header line, already confirmed
/// to start with the `to` keyword.
pub fn parse_to_header(line: &str) -> Result<(String, Vec<String>), RuntimeError> {
    let mut lex = Lexer::new(line, Mode::Code);
    match lex.next().kind {
        TokenKind::Word(w) if w.eq_ignore_ascii_case("to") => {}
        _ => return Err(RuntimeError::new(ErrorKind::DontKnowHow)),
    }
    let name = match lex.next().kind {
        TokenKind::Word(w) => w,
        _ => return Err(RuntimeError::new(ErrorKind::DontKnowHow)),
    };
    let mut params = Vec::new();
    loop {
        match lex.next().kind {
            TokenKind::Colon(p) => params.push(p),
            TokenKind::Eof => break,
            _ => return Err(RuntimeError::new(ErrorKind::DontKnowHow)),
        }
    }
    Ok((name, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_to_header_with_params() {
        let (name, params) = parse_to_header("to square :n").unwrap();
        assert_eq!(name, "square");
        assert_eq!(params, vec!["n".to_string()]);
    }

    #[test]
    fn parses_to_header_with_no_params() {
        let (name, params) = parse_to_header("to greet").unwrap();
        assert_eq!(name, "greet");
        assert!(params.is_empty());
    }

    #[test]
    fn single_physical_line_becomes_flat_node_list() {
        let mut m = Memory::default();
        let line = parse_instruction_line(&mut m, "print 3 + 4").unwrap();
        assert_eq!(m.list_len(line), 3);
    }

    #[test]
    fn bracket_group_becomes_real_sublist() {
        let mut m = Memory::default();
        let line = parse_instruction_line(&mut m, "repeat 3 [print \"hi]").unwrap();
        assert_eq!(m.list_len(line), 3);
        let bracket_arg = m.car(m.cdr(m.cdr(line)));
        assert!(bracket_arg.is_list());
        assert_eq!(m.list_len(bracket_arg), 2);
    }

    #[test]
    fn multi_physical_line_join_inserts_newline_marker() {
        let mut m = Memory::default();
        let line = parse_instruction_line(&mut m, "repeat 3 [\nprint \"hi\n]").unwrap();
        let bracket_arg = m.car(m.cdr(m.cdr(line)));
        assert!(bracket_arg.is_list());
        // NEWLINE, print, "hi, NEWLINE
        assert_eq!(m.list_len(bracket_arg), 4);
        let first = m.car(bracket_arg);
        assert!(first.is_newline());
    }

    #[test]
    fn unbalanced_brackets_report_mismatch() {
        let mut m = Memory::default();
        let err = parse_instruction_line(&mut m, "print [1 2").unwrap_err();
        assert_eq!(err.kind, ErrorKind::BracketMismatch);
    }
}
