//! Procedure table (C8, §4.8).
//!
//! A [`UserProc`] is a definition: a name, its formal parameters, and
//! the list-of-lists body (already parsed into arena nodes, so running
//! it again never re-lexes text). The table tracks bury/trace/step
//! flags per name and holds the single pending-tail-call slot the
//! evaluator (C9) uses to bounce self-recursive calls without growing
//! the Rust stack.

use std::collections::HashMap;

use crate::error::{ErrorKind, RuntimeError};
use crate::memory::Node;

/// One formal parameter: a name plus an optional default-expression
/// node for procedures defined with an input that can be omitted.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
}

/// A user-defined procedure: `to name :p1 :p2 ... body... end`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProc {
    pub name: String,
    pub params: Vec<String>,
    /// The body as a list of instruction-line lists, an arena `Node`.
    pub body: Node,
}

impl std::hash::Hash for UserProc {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcFlags {
    pub buried: bool,
    pub traced: bool,
    pub stepped: bool,
}

/// Pending self-tail-call handoff (§4.9's CPS bailout target). Set by
/// the evaluator when a procedure's last action is to call itself or
/// another user procedure in tail position, and drained by the
/// dispatch loop instead of recursing.
#[derive(Debug, Clone)]
pub struct PendingCall {
    pub proc: UserProc,
    pub args: Vec<crate::value::Value>,
}

#[derive(Default)]
pub struct Procedures {
    table: HashMap<String, UserProc>,
    flags: HashMap<String, ProcFlags>,
    pending_tail_call: Option<PendingCall>,
}

impl Procedures {
    pub fn new() -> Self {
        Procedures::default()
    }

    /// Defines or redefines a procedure. Redefining a primitive name is
    /// rejected by the caller (the evaluator checks the primitive
    /// registry first); this table only tracks user procedures. The
    /// table is keyed by lowercased name so lookups are
    /// case-insensitive (§4.8); `proc.name` itself keeps its declared
    /// case for `po`/`pots` display.
    pub fn define(&mut self, proc: UserProc) {
        let key = proc.name.to_ascii_lowercase();
        self.flags.entry(key.clone()).or_default();
        self.table.insert(key, proc);
    }

    pub fn find(&self, name: &str) -> Option<&UserProc> {
        self.table.get(&name.to_ascii_lowercase())
    }

    pub fn erase(&mut self, name: &str) -> Option<UserProc> {
        let key = name.to_ascii_lowercase();
        self.flags.remove(&key);
        self.table.remove(&key)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.table.contains_key(&name.to_ascii_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(|s| s.as_str())
    }

    pub fn bury(&mut self, name: &str) {
        self.flags.entry(name.to_ascii_lowercase()).or_default().buried = true;
    }

    pub fn unbury(&mut self, name: &str) {
        if let Some(f) = self.flags.get_mut(&name.to_ascii_lowercase()) {
            f.buried = false;
        }
    }

    pub fn is_buried(&self, name: &str) -> bool {
        self.flags.get(&name.to_ascii_lowercase()).is_some_and(|f| f.buried)
    }

    pub fn set_traced(&mut self, name: &str, traced: bool) {
        self.flags.entry(name.to_ascii_lowercase()).or_default().traced = traced;
    }

    pub fn is_traced(&self, name: &str) -> bool {
        self.flags.get(&name.to_ascii_lowercase()).is_some_and(|f| f.traced)
    }

    /// Validates a definition request isn't shadowing something it
    /// shouldn't: redefining an existing user procedure is allowed
    /// (Logo's `to` silently redefines), but the evaluator is
    /// responsible for rejecting primitive names before calling this.
    pub fn check_redefine(&self, name: &str, is_primitive: bool) -> Result<(), RuntimeError> {
        if is_primitive {
            return Err(RuntimeError::with_arg(ErrorKind::IsPrimitive, "define", name));
        }
        Ok(())
    }

    /// Records a tail call for the dispatch loop to pick up instead of
    /// recursing (§4.9). Overwrites any previous pending call — only
    /// one can be outstanding at a time.
    pub fn set_pending_tail_call(&mut self, proc: UserProc, args: Vec<crate::value::Value>) {
        self.pending_tail_call = Some(PendingCall { proc, args });
    }

    pub fn take_pending_tail_call(&mut self) -> Option<PendingCall> {
        self.pending_tail_call.take()
    }

    pub fn has_pending_tail_call(&self) -> bool {
        self.pending_tail_call.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Node;

    fn sample_proc(name: &str) -> UserProc {
        UserProc { name: name.to_string(), params: vec!["x".to_string()], body: Node::NIL }
    }

    #[test]
    fn define_then_find_round_trips() {
        let mut procs = Procedures::new();
        procs.define(sample_proc("square"));
        assert!(procs.is_defined("square"));
        assert_eq!(procs.find("square").unwrap().params, vec!["x".to_string()]);
    }

    #[test]
    fn redefining_a_primitive_name_is_rejected() {
        let procs = Procedures::new();
        assert!(procs.check_redefine("print", true).is_err());
        assert!(procs.check_redefine("square", false).is_ok());
    }

    #[test]
    fn erase_removes_definition_and_flags() {
        let mut procs = Procedures::new();
        procs.define(sample_proc("tmp"));
        procs.bury("tmp");
        procs.erase("tmp");
        assert!(!procs.is_defined("tmp"));
        assert!(!procs.is_buried("tmp"));
    }

    #[test]
    fn pending_tail_call_round_trips_once() {
        let mut procs = Procedures::new();
        procs.set_pending_tail_call(sample_proc("f"), vec![crate::value::Value::Number(1.0)]);
        assert!(procs.has_pending_tail_call());
        let call = procs.take_pending_tail_call().unwrap();
        assert_eq!(call.proc.name, "f");
        assert!(procs.take_pending_tail_call().is_none());
    }

    #[test]
    fn bury_and_unbury_toggle_independent_of_trace() {
        let mut procs = Procedures::new();
        procs.define(sample_proc("g"));
        procs.bury("g");
        procs.set_traced("g", true);
        assert!(procs.is_buried("g"));
        assert!(procs.is_traced("g"));
        procs.unbury("g");
        assert!(!procs.is_buried("g"));
        assert!(procs.is_traced("g"));
    }
}
