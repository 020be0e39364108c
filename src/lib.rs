//! `ulogo` — a core Logo language runtime sized for resource-constrained
//! targets: a unified cons-cell/atom arena with mark-sweep GC, a
//! tree-walking evaluator (with an optional bytecode VM accelerator),
//! and a line-oriented REPL. See `SPEC_FULL.md` for the full component
//! breakdown (C1–C12).

pub mod config;
pub mod error;
pub mod eval;
pub mod frame;
pub mod host;
pub mod interface;
pub mod lexer;
pub mod memory;
pub mod proc;
pub mod props;
pub mod token;
pub mod token_source;
pub mod value;
pub mod vars;

#[cfg(feature = "vm")]
pub mod vm;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{ErrorKind, RuntimeError};
pub use eval::Interpreter;
pub use host::Host;
pub use interface::{Repl, ReplOutcome};
pub use memory::{Memory, Node};
pub use value::{Status, Value};
