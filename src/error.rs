//! Error taxonomy (§6, §7).
//!
//! Errors are plain data, not an exception channel: they travel inside
//! `Status::Error` (see [`crate::value::Status`]) and are rendered to
//! text only at the REPL boundary, mirroring how the teacher crate's
//! `ParseError`/`ParseErrorKind` separate the error *shape* from its
//! *rendering* (`display_with_source`).

use crate::memory::Memory;
use crate::value::Value;

/// The error taxonomy of §6. Each variant carries exactly the data its
/// template needs; unused template slots simply don't exist as fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    DoesntLikeInput,
    NotEnoughInputs,
    DontKnowHow,
    DontKnowWhat,
    NoValue,
    DivideByZero,
    ParenMismatch,
    BracketMismatch,
    NotBool,
    Stopped,
    AtToplevel,
    OnlyInProcedure,
    AlreadyDefined,
    IsPrimitive,
    UnsupportedOnDevice,
    OutOfSpace,
    NoCatch,
}

/// A runtime error value, carrying enough context to fill in the
/// taxonomy's `%s` template slots (§6).
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    /// The user-visible procedure name that raised this error (after
    /// alias substitution — `bf` stays `bf`, not `butfirst`).
    pub proc: Option<String>,
    /// The offending argument, already stringified.
    pub arg: Option<String>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind) -> Self {
        RuntimeError { kind, proc: None, arg: None }
    }

    pub fn with_proc(kind: ErrorKind, proc: impl Into<String>) -> Self {
        RuntimeError { kind, proc: Some(proc.into()), arg: None }
    }

    pub fn with_arg(kind: ErrorKind, proc: impl Into<String>, arg: impl Into<String>) -> Self {
        RuntimeError { kind, proc: Some(proc.into()), arg: Some(arg.into()) }
    }

    /// Fills in the caller-visible procedure name, preserving whatever
    /// alias the caller actually used (`bf` vs. `butfirst`). Mirrors
    /// §4.11's `result_set_error_proc`.
    pub fn set_error_proc(&mut self, proc: impl Into<String>) {
        if self.proc.is_none() {
            self.proc = Some(proc.into());
        }
    }

    /// Renders this error against the taxonomy's format template (§6).
    pub fn message(&self) -> String {
        let proc = self.proc.as_deref().unwrap_or("?");
        let arg = self.arg.as_deref().unwrap_or("?");
        match self.kind {
            ErrorKind::DoesntLikeInput => format!("{} doesn't like {} as input", proc, arg),
            ErrorKind::NotEnoughInputs => format!("Not enough inputs to {}", proc),
            ErrorKind::DontKnowHow => format!("I don't know how to {}", proc),
            ErrorKind::DontKnowWhat => format!("I don't know what to do with {}", arg),
            ErrorKind::NoValue => format!("{} has no value", arg),
            ErrorKind::DivideByZero => "Can't divide by zero".to_string(),
            ErrorKind::ParenMismatch => "Too many parentheses".to_string(),
            ErrorKind::BracketMismatch => "Mismatched brackets".to_string(),
            ErrorKind::NotBool => format!("{} is not true or false", arg),
            ErrorKind::Stopped => "Stopped!".to_string(),
            ErrorKind::AtToplevel => "Can't do that at toplevel".to_string(),
            ErrorKind::OnlyInProcedure => "Can only be used inside a procedure".to_string(),
            ErrorKind::AlreadyDefined => format!("{} is already defined", arg),
            ErrorKind::IsPrimitive => format!("{} is a primitive", arg),
            ErrorKind::UnsupportedOnDevice => "Not supported on this device".to_string(),
            ErrorKind::OutOfSpace => "Out of space".to_string(),
            ErrorKind::NoCatch => format!("Can't find a catch for {}", arg),
        }
    }

    pub fn dont_know_what_to_do_with(memory: &Memory, v: Value) -> Self {
        RuntimeError { kind: ErrorKind::DontKnowWhat, proc: None, arg: Some(v.to_display_string(memory)) }
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divide_by_zero_is_literal() {
        let e = RuntimeError::new(ErrorKind::DivideByZero);
        assert_eq!(e.message(), "Can't divide by zero");
    }

    #[test]
    fn doesnt_like_input_fills_template() {
        let e = RuntimeError::with_arg(ErrorKind::DoesntLikeInput, "first", "[]");
        assert_eq!(e.message(), "first doesn't like [] as input");
    }

    #[test]
    fn set_error_proc_preserves_alias() {
        let mut e = RuntimeError::new(ErrorKind::NotEnoughInputs);
        e.set_error_proc("bf");
        e.set_error_proc("butfirst");
        assert_eq!(e.message(), "Not enough inputs to bf");
    }

    #[test]
    fn no_catch_names_tag() {
        let e = RuntimeError::with_arg(ErrorKind::NoCatch, "throw", "\"oops");
        assert_eq!(e.message(), "Can't find a catch for \"oops");
    }
}
