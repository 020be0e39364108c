//! Activation-frame arena (C7, §4.7).
//!
//! A bump-allocated stack of call frames, addressed by offset rather
//! than by Rust reference — the evaluator holds frame indices, not
//! borrows, so it can push/pop/rewrite frames while the rest of the
//! interpreter state is also being mutated. A self-recursive tail call
//! reuses the current top frame in place instead of pushing a new one,
//! which is what keeps `to f :n if :n = 0 [stop] f :n - 1 end` running
//! forever in bounded space (§8 property).
//!
//! Grounded on the bump/reset shape of the teacher's `arena.rs`, but
//! index-addressed rather than reference-addressed, and poppable one
//! frame at a time rather than reset-all-at-once, because procedure
//! calls need to unwind individually.

use crate::value::Value;

/// One activation record: the procedure name (for error messages and
/// `pause`), its parameter bindings, and a small expression-evaluation
/// value stack used while running its body.
#[derive(Debug, Clone)]
pub struct Frame {
    pub proc_name: String,
    pub bindings: Vec<(String, Value)>,
    pub value_stack: Vec<Value>,
    /// Set when this frame is paused mid-execution (`pause` primitive)
    /// so a later `continue` can resume it.
    pub paused: bool,
}

/// Folds a binding list's names to lowercase so frame lookups are
/// case-insensitive (§4.5, §4.7's `find_binding_in_chain`).
fn fold_binding_names(bindings: Vec<(String, Value)>) -> Vec<(String, Value)> {
    bindings.into_iter().map(|(n, v)| (n.to_ascii_lowercase(), v)).collect()
}

impl Frame {
    fn new(proc_name: String, bindings: Vec<(String, Value)>) -> Self {
        Frame {
            proc_name,
            bindings: fold_binding_names(bindings),
            value_stack: Vec::with_capacity(crate::config::INITIAL_VALUE_CAP),
            paused: false,
        }
    }

    pub fn get_binding(&self, name: &str) -> Option<Value> {
        let name = name.to_ascii_lowercase();
        self.bindings.iter().rev().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    pub fn set_binding(&mut self, name: &str, value: Value) {
        let name = name.to_ascii_lowercase();
        if let Some(slot) = self.bindings.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.bindings.push((name, value));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameError;

#[derive(Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub fn new() -> Self {
        FrameStack::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn push(&mut self, proc_name: String, bindings: Vec<(String, Value)>) -> Result<usize, FrameError> {
        if self.frames.len() >= crate::config::MAX_SCOPE_DEPTH {
            return Err(FrameError);
        }
        self.frames.push(Frame::new(proc_name, bindings));
        Ok(self.frames.len() - 1)
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Rewrites the topmost frame's bindings in place for a
    /// self-recursive tail call, without pushing a new frame (§4.7,
    /// §8's "stable arena usage under tail recursion" property).
    pub fn reuse_top_for_tail_call(&mut self, proc_name: String, bindings: Vec<(String, Value)>) -> Result<(), FrameError> {
        let frame = self.frames.last_mut().ok_or(FrameError)?;
        frame.proc_name = proc_name;
        frame.bindings = fold_binding_names(bindings);
        frame.value_stack.clear();
        frame.paused = false;
        Ok(())
    }

    /// Dynamic scope lookup: searches frames from innermost to
    /// outermost. Used when a name isn't found as a local in the
    /// current frame but Logo's dynamic scoping still makes it visible.
    pub fn find_binding_in_chain(&self, name: &str) -> Option<Value> {
        self.frames.iter().rev().find_map(|f| f.get_binding(name))
    }

    /// `make` on a name that's `local` somewhere up the call chain
    /// updates that binding in place rather than shadowing it with a
    /// new global (§4.5). Returns `true` if a frame held the name.
    pub fn set_binding_in_chain(&mut self, name: &str, value: Value) -> bool {
        let name_lower = name.to_ascii_lowercase();
        for frame in self.frames.iter_mut().rev() {
            if frame.bindings.iter().any(|(n, _)| *n == name_lower) {
                frame.set_binding(name, value);
                return true;
            }
        }
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_pop_round_trips() {
        let mut stack = FrameStack::new();
        stack.push("f".to_string(), vec![("n".to_string(), Value::Number(1.0))]).unwrap();
        assert_eq!(stack.depth(), 1);
        let frame = stack.pop().unwrap();
        assert_eq!(frame.proc_name, "f");
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn reuse_top_for_tail_call_keeps_depth_constant() {
        let mut stack = FrameStack::new();
        stack.push("f".to_string(), vec![("n".to_string(), Value::Number(5.0))]).unwrap();
        for i in (0..5).rev() {
            stack
                .reuse_top_for_tail_call("f".to_string(), vec![("n".to_string(), Value::Number(i as f32))])
                .unwrap();
            assert_eq!(stack.depth(), 1);
        }
        assert_eq!(stack.top().unwrap().get_binding("n"), Some(Value::Number(0.0)));
    }

    #[test]
    fn find_binding_in_chain_searches_innermost_first() {
        let mut stack = FrameStack::new();
        stack.push("outer".to_string(), vec![("x".to_string(), Value::Number(1.0))]).unwrap();
        stack.push("inner".to_string(), vec![("x".to_string(), Value::Number(2.0))]).unwrap();
        assert_eq!(stack.find_binding_in_chain("x"), Some(Value::Number(2.0)));
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut stack = FrameStack::new();
        for _ in 0..crate::config::MAX_SCOPE_DEPTH {
            stack.push("f".to_string(), Vec::new()).unwrap();
        }
        assert_eq!(stack.push("f".to_string(), Vec::new()), Err(FrameError));
    }

    #[test]
    fn set_binding_overwrites_existing_name() {
        let mut frame = Frame::new("f".to_string(), vec![("n".to_string(), Value::Number(1.0))]);
        frame.set_binding("n", Value::Number(9.0));
        assert_eq!(frame.get_binding("n"), Some(Value::Number(9.0)));
    }

    #[test]
    fn set_binding_in_chain_updates_the_innermost_holder() {
        let mut stack = FrameStack::new();
        stack.push("outer".to_string(), vec![("x".to_string(), Value::Number(1.0))]).unwrap();
        stack.push("inner".to_string(), Vec::new()).unwrap();
        assert!(stack.set_binding_in_chain("x", Value::Number(9.0)));
        assert_eq!(stack.find_binding_in_chain("x"), Some(Value::Number(9.0)));
        assert!(!stack.set_binding_in_chain("nope", Value::Number(0.0)));
    }

    #[test]
    fn bindings_are_looked_up_case_insensitively() {
        let mut stack = FrameStack::new();
        stack.push("f".to_string(), vec![("Count".to_string(), Value::Number(1.0))]).unwrap();
        assert_eq!(stack.find_binding_in_chain("count"), Some(Value::Number(1.0)));
    }
}
