//! Runtime values and the control-flow result type (§3, §4.9).
//!
//! `Value` is the tagged union that procedures and primitives pass
//! around. `Status` is the richer "what happened" envelope an
//! evaluation step produces — not just a value but possibly a
//! tail-call handoff, a non-local exit, or an error — the way the
//! teacher crate's `interpreter.rs` threads a control-flow enum
//! through its tree-walk instead of using exceptions.

use crate::error::RuntimeError;
use crate::memory::{Memory, Node};
use crate::proc::UserProc;

/// A Logo value. Lists and words are handles into the [`Memory`]
/// arena; numbers and the absence of a value live outside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// No value — the result of e.g. `print` or `make`.
    None,
    /// A line-break token, preserved only for display purposes.
    Newline,
    Number(f32),
    Word(Node),
    List(Node),
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_number(&self) -> Option<f32> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_word(&self) -> Option<Node> {
        match self {
            Value::Word(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<Node> {
        match self {
            Value::List(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_truthy_bool(&self, memory: &Memory) -> Option<bool> {
        match self {
            Value::Word(n) => match memory.word_str(*n) {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Structural/numeric equality, per §4.2: numbers compare by IEEE
    /// value, words by interned identity (so case differs means
    /// unequal, matching [`Memory::atom`]'s case-sensitive interning),
    /// lists by recursive structural comparison.
    pub fn equals(&self, other: &Value, memory: &Memory) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Newline, Value::Newline) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Word(a), Value::Word(b)) => a == b,
            (Value::List(a), Value::List(b)) => lists_equal(memory, *a, *b),
            _ => false,
        }
    }

    /// Renders this value the way `print`/`show` would, for embedding
    /// in error messages (§6's `%s` slots) and REPL output.
    pub fn to_display_string(&self, memory: &Memory) -> String {
        match self {
            Value::None => String::new(),
            Value::Newline => String::new(),
            Value::Number(n) => format_number(*n),
            Value::Word(w) => memory.word_str(*w).to_string(),
            Value::List(l) => display_list(memory, *l),
        }
    }
}

fn lists_equal(memory: &Memory, mut a: Node, mut b: Node) -> bool {
    loop {
        match (a.is_nil(), b.is_nil()) {
            (true, true) => return true,
            (true, false) | (false, true) => return false,
            _ => {}
        }
        let (ca, cb) = (memory.car(a), memory.car(b));
        let equal_heads = match (node_to_value(ca), node_to_value(cb)) {
            (Some(va), Some(vb)) => va.equals(&vb, memory),
            _ => ca == cb,
        };
        if !equal_heads {
            return false;
        }
        a = memory.cdr(a);
        b = memory.cdr(b);
    }
}

/// Reinterprets a raw arena node as a `Value`, for list traversal where
/// elements are stored untagged-by-Value (words/sublists/newline).
pub fn node_to_value(n: Node) -> Option<Value> {
    if n.is_word() {
        Some(Value::Word(n))
    } else if n.is_list() {
        Some(Value::List(n))
    } else if n.is_newline() {
        Some(Value::Newline)
    } else {
        None
    }
}

fn display_list(memory: &Memory, mut n: Node) -> String {
    let mut parts = Vec::new();
    while !n.is_nil() {
        let head = memory.car(n);
        let rendered = match node_to_value(head) {
            Some(v) => v.to_display_string(memory),
            None => String::new(),
        };
        parts.push(rendered);
        n = memory.cdr(n);
    }
    format!("[{}]", parts.join(" "))
}

/// Formats a number per §6: up to 6 significant digits, fixed-point
/// for exponents in `[-4, 5]`, otherwise scientific notation using
/// `e` (and `n` for a negative exponent) in place of `e-`.
pub fn format_number(n: f32) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if !n.is_finite() {
        return if n.is_nan() { "0".to_string() } else if n > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }

    let mag = n.abs();
    let exponent = mag.log10().floor() as i32;

    if (-4..=5).contains(&exponent) {
        let decimals = (5 - exponent).max(0) as usize;
        let mut s = format!("{:.*}", decimals, n);
        if s.contains('.') {
            while s.ends_with('0') {
                s.pop();
            }
            if s.ends_with('.') {
                s.pop();
            }
        }
        s
    } else {
        let mantissa = n / 10f32.powi(exponent);
        let mut mantissa_str = format!("{:.5}", mantissa);
        while mantissa_str.ends_with('0') {
            mantissa_str.pop();
        }
        if mantissa_str.ends_with('.') {
            mantissa_str.pop();
        }
        if exponent < 0 {
            format!("{}n{}", mantissa_str, -exponent)
        } else {
            format!("{}e{}", mantissa_str, exponent)
        }
    }
}

/// The outcome of evaluating one expression or instruction (§4.9).
/// Unlike `Value`, this threads control flow: a tail call doesn't
/// produce a `Value` yet, it hands the caller a pending call to
/// dispatch without growing the Rust call stack.
#[derive(Debug, Clone)]
pub enum Status {
    /// Plain value result.
    Ok(Value),
    /// No result and nothing noteworthy happened.
    None,
    /// `stop` was executed inside a procedure.
    Stop,
    /// `output` was executed inside a procedure, carrying its value.
    Output(Value),
    /// A runtime error was raised.
    Error(RuntimeError),
    /// `throw` was executed; `None` tag value targets the default catch.
    Throw(Node, Option<Value>),
    /// Reserved for a host that wants to unwind a pause out through
    /// `Status` instead of handling it inline. The `pause` primitive
    /// itself never produces this: it blocks synchronously via
    /// `crate::interface::run_pause_repl` and returns whatever status
    /// the sub-REPL resolved to (§4.9, §4.12).
    Pause(String),
    /// A tail call that the evaluator should dispatch without
    /// recursing the Rust stack (§4.9's CPS bailout).
    Call(UserProc, Vec<Value>),
    /// `goto` jumped to the named tag within the current procedure.
    Goto(String),
}

impl Status {
    pub fn is_control(&self) -> bool {
        !matches!(self, Status::Ok(_) | Status::None)
    }

    pub fn into_value(self) -> Value {
        match self {
            Status::Ok(v) => v,
            Status::Output(v) => v,
            _ => Value::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_by_value() {
        let m = Memory::default();
        assert!(Value::Number(1.0).equals(&Value::Number(1.0), &m));
        assert!(!Value::Number(1.0).equals(&Value::Number(2.0), &m));
    }

    #[test]
    fn words_compare_by_identity() {
        let mut m = Memory::default();
        let a = Value::Word(m.atom_str("hi"));
        let b = Value::Word(m.atom_str("hi"));
        let c = Value::Word(m.atom_str("HI"));
        assert!(a.equals(&b, &m));
        assert!(!a.equals(&c, &m));
    }

    #[test]
    fn lists_compare_structurally() {
        let mut m = Memory::default();
        let one = m.atom_str("1");
        let two = m.atom_str("2");
        let l1 = m.cons_list(&[one, two]);
        let l2 = m.cons_list(&[one, two]);
        assert!(Value::List(l1).equals(&Value::List(l2), &m));
    }

    #[test]
    fn format_number_fixed_point() {
        assert_eq!(format_number(7.0), "7");
        assert_eq!(format_number(3.5), "3.5");
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-2.0), "-2");
    }

    #[test]
    fn format_number_scientific_for_large_exponent() {
        let s = format_number(1_000_000.0);
        assert!(s.contains('e'), "expected scientific notation, got {s}");
    }

    #[test]
    fn format_number_scientific_for_small_exponent() {
        let s = format_number(0.0000001);
        assert!(s.contains('n'), "expected negative-exponent marker, got {s}");
    }

    #[test]
    fn display_list_renders_brackets() {
        let mut m = Memory::default();
        let a = m.atom_str("a");
        let b = m.atom_str("b");
        let l = m.cons_list(&[a, b]);
        assert_eq!(Value::List(l).to_display_string(&m), "[a b]");
    }
}
