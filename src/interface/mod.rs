//! The REPL interface (C12, §4.12): drives an [`Interpreter`] from
//! lines of text supplied by a [`Host`], recognizing `to ... end`
//! procedure definitions, bracket continuation, and the pause sub-REPL.
//!
//! [`Interpreter`]: crate::eval::Interpreter
//! [`Host`]: crate::host::Host

mod body;
mod repl;

pub use repl::{Repl, ReplOutcome};
pub(crate) use repl::run_pause_repl;
