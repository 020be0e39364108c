//! Compile-time capacity constants (§6).
//!
//! These are the knobs an embedder tunes for a given target. Defaults
//! match the reference sizes named in the specification.

/// Total size, in bytes, of the unified cons-cell/atom arena (C1).
pub const MEMORY_SIZE: usize = 131_072;

/// Maximum number of named parameters a single procedure may declare.
pub const MAX_PROC_PARAMS: usize = 16;

/// Maximum number of bindings in the global variable table.
pub const MAX_GLOBAL_VARIABLES: usize = 128;

/// Maximum number of local bindings within a single scope frame.
pub const MAX_LOCAL_VARIABLES: usize = 64;

/// Maximum nesting depth of variable scopes (procedure call depth, effectively).
pub const MAX_SCOPE_DEPTH: usize = 32;

/// Maximum length, in bytes, of one line read by the REPL.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Maximum size, in bytes, of the `to ... end` accumulation buffer.
pub const MAX_PROC_BUFFER: usize = 4096;

/// Initial number of expression-stack slots a freshly pushed frame gets.
pub const INITIAL_VALUE_CAP: usize = 8;

/// Fixed stack depth for the bytecode VM (C10).
pub const VM_STACK_SIZE: usize = 64;
