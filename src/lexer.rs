//! Character-stream lexer (C3, §4.3).
//!
//! Two modes: *code* mode treats `[ ] ( ) + - * / = < >` and whitespace
//! as delimiters; *data* mode (reading a word from list-literal text)
//! only breaks on brackets and whitespace. Both modes share the same
//! number grammar and the same unary-minus disambiguation rule — the
//! iterator variant of [`crate::token_source::TokenSource`] must mirror
//! these rules exactly (§9) so round-tripped procedure bodies behave
//! identically whichever producer re-reads them.

use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Code,
    Data,
}

/// Classifies what came immediately before a `-`, to disambiguate
/// unary vs. binary minus (§4.3). Mirrored by
/// `token_source::classify_preceding` for the list-iterator producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecedingKind {
    StartOfInput,
    OpenBracketOrParen,
    Operator,
    CloseParen,
    Number,
    Quoted,
    Word,
    Colon,
    Whitespace,
}

#[derive(Clone)]
pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    mode: Mode,
    preceding: PrecedingKind,
    saved: Option<(usize, PrecedingKind)>,
}

const CODE_DELIMITERS: &[u8] = b"[]()+-*/=<>";

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, mode: Mode) -> Self {
        Lexer { src: src.as_bytes(), pos: 0, mode, preceding: PrecedingKind::StartOfInput, saved: None }
    }

    pub fn at_end(&self) -> bool {
        self.remaining_non_ws() == 0
    }

    fn remaining_non_ws(&self) -> usize {
        let mut p = self.pos;
        while p < self.src.len() && is_space(self.src[p]) {
            p += 1;
        }
        self.src.len() - p
    }

    fn peek_byte(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.pos < self.src.len() && is_space(self.src[self.pos]) {
            self.pos += 1;
        }
        self.pos != start
    }

    /// Saves lexer position for a later [`Lexer::peek`]-style restore.
    pub fn save(&mut self) {
        self.saved = Some((self.pos, self.preceding));
    }

    pub fn restore(&mut self) {
        if let Some((pos, preceding)) = self.saved.take() {
            self.pos = pos;
            self.preceding = preceding;
        }
    }

    /// Saves state, reads one token, restores state, returns the token.
    pub fn peek(&mut self) -> Token {
        self.save();
        let tok = self.next();
        self.restore();
        tok
    }

    pub fn next(&mut self) -> Token {
        let had_ws = self.skip_ws();
        let start = self.pos;

        let Some(b) = self.peek_byte() else {
            return Token::new(TokenKind::Eof, Span::new(start, start));
        };

        if b == b'\n' {
            self.pos += 1;
            self.preceding = PrecedingKind::Whitespace;
            return Token::new(TokenKind::Newline, Span::new(start, self.pos));
        }

        if self.mode == Mode::Code {
            match b {
                b'[' => return self.single(TokenKind::LBracket, PrecedingKind::OpenBracketOrParen),
                b']' => return self.single(TokenKind::RBracket, PrecedingKind::CloseParen),
                b'(' => return self.single(TokenKind::LParen, PrecedingKind::OpenBracketOrParen),
                b')' => return self.single(TokenKind::RParen, PrecedingKind::CloseParen),
                b'+' | b'*' | b'/' | b'=' | b'<' | b'>' => {
                    return self.operator_token(had_ws);
                }
                b'-' => return self.minus_token(had_ws),
                _ => {}
            }
        } else if b == b'[' || b == b']' {
            let kind = if b == b'[' { TokenKind::LBracket } else { TokenKind::RBracket };
            let preceding = if b == b'[' { PrecedingKind::OpenBracketOrParen } else { PrecedingKind::CloseParen };
            return self.single(kind, preceding);
        }

        if b == b'"' {
            self.pos += 1;
            let word = self.read_bareword();
            self.preceding = PrecedingKind::Quoted;
            return Token::new(TokenKind::QuotedWord(word), Span::new(start, self.pos));
        }

        if b == b':' {
            self.pos += 1;
            let word = self.read_bareword();
            self.preceding = PrecedingKind::Colon;
            return Token::new(TokenKind::Colon(word), Span::new(start, self.pos));
        }

        let word = self.read_bareword();
        self.preceding = PrecedingKind::Word;
        if let Some(n) = parse_number(&word) {
            return Token::new(TokenKind::Number(n), Span::new(start, self.pos));
        }
        Token::new(TokenKind::Word(word), Span::new(start, self.pos))
    }

    fn single(&mut self, kind: TokenKind, preceding: PrecedingKind) -> Token {
        let start = self.pos;
        self.pos += 1;
        self.preceding = preceding;
        Token::new(kind, Span::new(start, self.pos))
    }

    fn operator_token(&mut self, had_ws: bool) -> Token {
        let _ = had_ws;
        let start = self.pos;
        self.pos += 1;
        let op = std::str::from_utf8(&self.src[start..self.pos]).unwrap().to_string();
        self.preceding = PrecedingKind::Operator;
        Token::new(TokenKind::Operator(op), Span::new(start, self.pos))
    }

    /// Implements the unary-minus disambiguation of §4.3 exactly.
    fn minus_token(&mut self, had_ws: bool) -> Token {
        let start = self.pos;
        let binary = !had_ws
            && matches!(
                self.preceding,
                PrecedingKind::CloseParen
                    | PrecedingKind::Number
                    | PrecedingKind::Quoted
                    | PrecedingKind::Word
                    | PrecedingKind::Colon
            );

        if binary {
            self.pos += 1;
            self.preceding = PrecedingKind::Operator;
            return Token::new(TokenKind::Operator("-".to_string()), Span::new(start, self.pos));
        }

        // Unary: if followed directly by a digit, fold into a negative
        // number literal; otherwise emit as a standalone operator the
        // evaluator treats as prefix negation.
        self.pos += 1;
        if self.peek_byte().is_some_and(|c| c.is_ascii_digit()) {
            let word_start = self.pos;
            let rest = self.read_bareword();
            let full = format!("-{rest}");
            self.preceding = PrecedingKind::Number;
            if let Some(n) = parse_number(&full) {
                return Token::new(TokenKind::Number(n), Span::new(start, self.pos));
            }
            // Not actually a valid number continuation; treat as unary op only.
            self.pos = word_start;
        }
        self.preceding = PrecedingKind::Operator;
        Token::new(TokenKind::Operator("unary-".to_string()), Span::new(start, self.pos))
    }

    fn read_bareword(&mut self) -> String {
        let start = self.pos;
        let mut out = Vec::new();
        while let Some(b) = self.peek_byte() {
            if b == b'\\' {
                self.pos += 1;
                if let Some(escaped) = self.peek_byte() {
                    out.push(escaped);
                    self.pos += 1;
                }
                continue;
            }
            let is_delim = is_space(b)
                || b == b'\n'
                || b == b'['
                || b == b']'
                || (self.mode == Mode::Code && (b == b'(' || b == b')' || CODE_DELIMITERS.contains(&b)));
            if is_delim {
                break;
            }
            out.push(b);
            self.pos += 1;
        }
        let _ = start;
        String::from_utf8_lossy(&out).into_owned()
    }
}

fn is_space(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Recognizes `sign? digits ('.' digits)? ([eEnN] sign? digits)?`
/// (§4.3). `n`/`N` marks a negative decimal exponent, so `1n4` ≡ `1e-4`.
pub fn parse_number(word: &str) -> Option<f32> {
    let bytes = word.as_bytes();
    if bytes.is_empty() {
        return None;
    }
    let mut i = 0;
    if bytes[i] == b'+' || bytes[i] == b'-' {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return None;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == frac_start {
            return None;
        }
    }
    let mut rust_repr = word[..i].to_string();
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E' | b'n' | b'N') {
        let negative_exp = matches!(bytes[i], b'n' | b'N');
        i += 1;
        let mut exp_sign = String::new();
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            if bytes[i] == b'-' {
                exp_sign.push('-');
            }
            i += 1;
        } else if negative_exp {
            exp_sign.push('-');
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return None;
        }
        rust_repr.push('e');
        rust_repr.push_str(&exp_sign);
        rust_repr.push_str(&word[exp_start..i]);
    }
    if i != bytes.len() {
        return None;
    }
    rust_repr.parse::<f32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_number_parses() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number("3.5"), Some(3.5));
    }

    #[test]
    fn n_exponent_is_negative() {
        assert_eq!(parse_number("1n4"), Some(1e-4));
    }

    #[test]
    fn e_exponent_is_positive_by_default() {
        assert_eq!(parse_number("1e4"), Some(1e4));
    }

    #[test]
    fn non_number_words_do_not_parse() {
        assert_eq!(parse_number("hello"), None);
        assert_eq!(parse_number("-"), None);
    }

    #[test]
    fn lexes_brackets_and_parens_in_code_mode() {
        let mut lex = Lexer::new("[ ( ) ]", Mode::Code);
        assert_eq!(lex.next().kind, TokenKind::LBracket);
        assert_eq!(lex.next().kind, TokenKind::LParen);
        assert_eq!(lex.next().kind, TokenKind::RParen);
        assert_eq!(lex.next().kind, TokenKind::RBracket);
        assert!(lex.next().is_eof());
    }

    #[test]
    fn minus_after_number_with_no_space_is_binary() {
        let mut lex = Lexer::new("5-3", Mode::Code);
        assert_eq!(lex.next().kind, TokenKind::Number(5.0));
        assert_eq!(lex.next().kind, TokenKind::Operator("-".to_string()));
        assert_eq!(lex.next().kind, TokenKind::Number(3.0));
    }

    #[test]
    fn minus_after_whitespace_before_digit_is_negative_literal() {
        let mut lex = Lexer::new("sum 3 -4", Mode::Code);
        assert_eq!(lex.next().kind, TokenKind::Word("sum".to_string()));
        assert_eq!(lex.next().kind, TokenKind::Number(3.0));
        assert_eq!(lex.next().kind, TokenKind::Number(-4.0));
    }

    #[test]
    fn minus_at_start_of_input_before_digit_is_negative_literal() {
        let mut lex = Lexer::new("-4 + 1", Mode::Code);
        assert_eq!(lex.next().kind, TokenKind::Number(-4.0));
    }

    #[test]
    fn minus_after_open_paren_before_word_is_unary_operator() {
        let mut lex = Lexer::new("(-:x)", Mode::Code);
        assert_eq!(lex.next().kind, TokenKind::LParen);
        assert_eq!(lex.next().kind, TokenKind::Operator("unary-".to_string()));
        assert_eq!(lex.next().kind, TokenKind::Colon("x".to_string()));
    }

    #[test]
    fn quoted_word_and_colon_are_recognized() {
        let mut lex = Lexer::new("\"hello :x", Mode::Code);
        assert_eq!(lex.next().kind, TokenKind::QuotedWord("hello".to_string()));
        assert_eq!(lex.next().kind, TokenKind::Colon("x".to_string()));
    }

    #[test]
    fn data_mode_treats_operators_as_part_of_word() {
        let mut lex = Lexer::new("3+4", Mode::Data);
        assert_eq!(lex.next().kind, TokenKind::Word("3+4".to_string()));
    }

    #[test]
    fn peek_does_not_advance() {
        let mut lex = Lexer::new("abc def", Mode::Code);
        let first = lex.peek();
        let second = lex.next();
        assert_eq!(first, second);
        assert_eq!(lex.next().kind, TokenKind::Word("def".to_string()));
    }

    #[test]
    fn embedded_newline_is_its_own_token() {
        let mut lex = Lexer::new("[1 2\n3]", Mode::Code);
        assert_eq!(lex.next().kind, TokenKind::LBracket);
        assert_eq!(lex.next().kind, TokenKind::Number(1.0));
        assert_eq!(lex.next().kind, TokenKind::Number(2.0));
        assert_eq!(lex.next().kind, TokenKind::Newline);
        assert_eq!(lex.next().kind, TokenKind::Number(3.0));
        assert_eq!(lex.next().kind, TokenKind::RBracket);
    }

    #[test]
    fn backslash_escapes_one_byte_verbatim() {
        let mut lex = Lexer::new(r"a\+b", Mode::Code);
        assert_eq!(lex.next().kind, TokenKind::Word("a+b".to_string()));
    }
}
