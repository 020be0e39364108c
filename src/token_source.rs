//! Polymorphic token source (C4, §4.4): unifies a text [`Lexer`] and an
//! iterator over an already-parsed cons list, so the evaluator can run
//! a stored list as code without serializing it back to text.
//!
//! The node-iterator variant classifies each list element on the fly
//! by inspecting its first byte, and tracks whether the previous token
//! was a delimiter so it can reproduce the lexer's unary-minus rule
//! exactly (§9 — divergence here would break round-tripping of stored
//! procedure bodies).

use crate::lexer::{parse_number, Lexer, Mode, PrecedingKind};
use crate::memory::{Memory, Node};
use crate::token::{Span, Token, TokenKind};

/// A saved cursor, restorable via [`TokenSource::set_position`] — used
/// by CPS resumption to rewind to where a `Call` bailout occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position(Node);

#[derive(Clone)]
pub enum TokenSource<'a> {
    Text(Lexer<'a>),
    Nodes(NodeIterator),
}

impl<'a> TokenSource<'a> {
    pub fn from_text(src: &'a str, mode: Mode) -> Self {
        TokenSource::Text(Lexer::new(src, mode))
    }

    pub fn from_list(list: Node) -> Self {
        TokenSource::Nodes(NodeIterator::new(list))
    }

    pub fn next(&mut self, memory: &Memory) -> Token {
        match self {
            TokenSource::Text(lex) => lex.next(),
            TokenSource::Nodes(it) => it.next(memory),
        }
    }

    pub fn peek(&mut self, memory: &Memory) -> Token {
        match self {
            TokenSource::Text(lex) => lex.peek(),
            TokenSource::Nodes(it) => it.peek(memory),
        }
    }

    pub fn at_end(&self, memory: &Memory) -> bool {
        match self {
            TokenSource::Text(lex) => lex.at_end(),
            TokenSource::Nodes(it) => it.at_end(memory),
        }
    }

    pub fn get_position(&self) -> Position {
        match self {
            TokenSource::Text(_) => Position(Node::NIL),
            TokenSource::Nodes(it) => it.get_position(),
        }
    }

    pub fn set_position(&mut self, pos: Position) {
        if let TokenSource::Nodes(it) = self {
            it.set_position(pos);
        }
    }

    /// If the last token emitted was `LEFT_BRACKET` over a node-backed
    /// source, returns the pre-existing sublist node rather than
    /// requiring the caller to re-lex bracket contents from text.
    pub fn consume_sublist(&mut self) -> Option<Node> {
        match self {
            TokenSource::Nodes(it) => it.consume_sublist(),
            TokenSource::Text(_) => None,
        }
    }
}

#[derive(Clone, Copy)]
pub struct NodeIterator {
    /// Remaining elements of the list being walked.
    cursor: Node,
    preceding: PrecedingKind,
    pending_sublist: Option<Node>,
}

impl NodeIterator {
    pub fn new(list: Node) -> Self {
        NodeIterator { cursor: list, preceding: PrecedingKind::StartOfInput, pending_sublist: None }
    }

    pub fn at_end(&self, _memory: &Memory) -> bool {
        self.cursor.is_nil()
    }

    pub fn get_position(&self) -> Position {
        Position(self.cursor)
    }

    pub fn set_position(&mut self, pos: Position) {
        self.cursor = pos.0;
    }

    fn advance(&mut self, memory: &Memory) -> Option<Node> {
        if self.cursor.is_nil() {
            return None;
        }
        let head = memory.car(self.cursor);
        self.cursor = memory.cdr(self.cursor);
        Some(head)
    }

    pub fn consume_sublist(&mut self) -> Option<Node> {
        self.pending_sublist.take()
    }

    pub fn peek(&mut self, memory: &Memory) -> Token {
        let saved_cursor = self.cursor;
        let saved_preceding = self.preceding;
        let saved_pending = self.pending_sublist;
        let tok = self.next(memory);
        self.cursor = saved_cursor;
        self.preceding = saved_preceding;
        self.pending_sublist = saved_pending;
        tok
    }

    pub fn next(&mut self, memory: &Memory) -> Token {
        let Some(head) = self.advance(memory) else {
            return Token::new(TokenKind::Eof, Span::default());
        };

        if head.is_list() {
            self.pending_sublist = Some(head);
            self.preceding = PrecedingKind::OpenBracketOrParen;
            return Token::new(TokenKind::LBracket, Span::default());
        }

        if head.is_newline() {
            self.preceding = PrecedingKind::Whitespace;
            return Token::new(TokenKind::Newline, Span::default());
        }

        let text = memory.word_str(head);
        self.classify_word(text)
    }

    fn classify_word(&mut self, text: &str) -> Token {
        let mut chars = text.chars();
        let Some(first) = chars.next() else {
            self.preceding = PrecedingKind::Word;
            return Token::new(TokenKind::Word(String::new()), Span::default());
        };

        let token = match first {
            '"' => {
                self.preceding = PrecedingKind::Quoted;
                TokenKind::QuotedWord(text[1..].to_string())
            }
            ':' => {
                self.preceding = PrecedingKind::Colon;
                TokenKind::Colon(text[1..].to_string())
            }
            '[' if text.len() == 1 => {
                self.preceding = PrecedingKind::OpenBracketOrParen;
                TokenKind::LBracket
            }
            ']' if text.len() == 1 => {
                self.preceding = PrecedingKind::CloseParen;
                TokenKind::RBracket
            }
            '(' if text.len() == 1 => {
                self.preceding = PrecedingKind::OpenBracketOrParen;
                TokenKind::LParen
            }
            ')' if text.len() == 1 => {
                self.preceding = PrecedingKind::CloseParen;
                TokenKind::RParen
            }
            '-' if text.len() == 1 => {
                // Mirrors the lexer's unary-minus rule (§4.3, §9):
                // here there is no whitespace concept, so the
                // preceding-token classification alone decides.
                let binary = matches!(
                    self.preceding,
                    PrecedingKind::CloseParen
                        | PrecedingKind::Number
                        | PrecedingKind::Quoted
                        | PrecedingKind::Word
                        | PrecedingKind::Colon
                );
                self.preceding = PrecedingKind::Operator;
                TokenKind::Operator(if binary { "-".to_string() } else { "unary-".to_string() })
            }
            '+' | '*' | '/' | '=' | '<' | '>' if text.len() == 1 => {
                self.preceding = PrecedingKind::Operator;
                TokenKind::Operator(text.to_string())
            }
            _ => {
                if let Some(n) = parse_number(text) {
                    self.preceding = PrecedingKind::Number;
                    TokenKind::Number(n)
                } else {
                    self.preceding = PrecedingKind::Word;
                    TokenKind::Word(text.to_string())
                }
            }
        };
        Token::new(token, Span::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Mode;

    #[test]
    fn node_iterator_classifies_quoted_colon_and_number() {
        let mut m = Memory::default();
        let q = m.atom_str("\"hi");
        let c = m.atom_str(":x");
        let n = m.atom_str("42");
        let list = m.cons_list(&[q, c, n]);
        let mut it = NodeIterator::new(list);
        assert_eq!(it.next(&m).kind, TokenKind::QuotedWord("hi".to_string()));
        assert_eq!(it.next(&m).kind, TokenKind::Colon("x".to_string()));
        assert_eq!(it.next(&m).kind, TokenKind::Number(42.0));
        assert!(it.at_end(&m));
    }

    #[test]
    fn node_iterator_exposes_embedded_sublist() {
        let mut m = Memory::default();
        let inner_a = m.atom_str("a");
        let inner = m.cons_list(&[inner_a]);
        let outer = m.cons_list(&[inner]);
        let mut it = NodeIterator::new(outer);
        let tok = it.next(&m);
        assert_eq!(tok.kind, TokenKind::LBracket);
        assert_eq!(it.consume_sublist(), Some(inner));
    }

    #[test]
    fn node_iterator_mirrors_lexer_unary_minus_rule() {
        let mut m = Memory::default();
        let five = m.atom_str("5");
        let minus = m.atom_str("-");
        let three = m.atom_str("3");
        let list = m.cons_list(&[five, minus, three]);
        let mut it = NodeIterator::new(list);
        assert_eq!(it.next(&m).kind, TokenKind::Number(5.0));
        assert_eq!(it.next(&m).kind, TokenKind::Operator("-".to_string()));
    }

    #[test]
    fn text_source_delegates_to_lexer() {
        let mut source = TokenSource::from_text("3 + 4", Mode::Code);
        let m = Memory::default();
        assert_eq!(source.next(&m).kind, TokenKind::Number(3.0));
        assert_eq!(source.next(&m).kind, TokenKind::Operator("+".to_string()));
    }
}
