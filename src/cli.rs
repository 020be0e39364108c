//! Command-line glue (SPEC_FULL §E): a stdio [`Host`] plus `clap`-
//! derived argument parsing, mirroring the teacher's `cli.rs` shape
//! (`Cli` + `run_cli`) scaled to a much smaller surface — one
//! subcommand-free mode (load a file, then/or start the REPL) instead
//! of a package manager's subcommand tree.

use std::fs;
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use clap::Parser;
use rand::Rng;

use crate::host::{Host, ReadLine};
use crate::interface::Repl;
use crate::value::Status;

#[derive(Parser)]
#[command(name = "ulogo")]
#[command(about = "A small Logo interpreter", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Load and run a `.lg`/`.logo` file before starting the REPL.
    #[arg(long, value_name = "FILE")]
    pub load: Option<String>,

    /// Use the bytecode accelerator (on by default when the `vm`
    /// feature is compiled in).
    #[arg(long)]
    pub vm: bool,

    /// Disable the bytecode accelerator and always tree-walk.
    #[arg(long)]
    pub no_vm: bool,
}

/// A [`Host`] backed by real stdin/stdout.
#[derive(Default)]
pub struct StdioHost;

impl Host for StdioHost {
    fn sleep(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }

    fn random(&mut self) -> u32 {
        rand::thread_rng().gen()
    }

    fn write(&mut self, bytes: &[u8]) {
        let _ = io::stdout().write_all(bytes);
    }

    fn flush(&mut self) {
        let _ = io::stdout().flush();
    }

    fn read_line(&mut self, buffer: &mut Vec<u8>) -> ReadLine {
        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => ReadLine::Eof,
            Ok(n) => {
                buffer.extend_from_slice(line.as_bytes());
                ReadLine::Bytes(n)
            }
            Err(_) => ReadLine::Eof,
        }
    }
}

/// Entry point for the `ulogo` binary.
pub fn run_cli() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut repl = Repl::new();

    #[cfg(feature = "vm")]
    {
        if cli.no_vm {
            repl.interpreter_mut().use_vm = false;
        } else if cli.vm {
            repl.interpreter_mut().use_vm = true;
        }
    }
    #[cfg(not(feature = "vm"))]
    let _ = (cli.vm, cli.no_vm);

    let mut host = StdioHost::default();

    if let Some(path) = &cli.load {
        let text = fs::read_to_string(path)?;
        repl.load_text(&mut host, &text);
    }

    repl.run(&mut host);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;

    #[test]
    fn load_text_defines_and_drops_to_top_level() {
        let mut repl = Repl::new();
        let mut host = NullHost::default();
        repl.load_text(&mut host, "to square :n\noutput :n * :n\nend\nprint square 6\n");
        assert!(repl.interpreter().procs.is_defined("square"));
        assert_eq!(host.output, b"36\n".to_vec());
    }

    #[test]
    fn eval_text_errors_render_as_plain_messages() {
        let mut interp = crate::eval::Interpreter::new();
        let mut host = NullHost::default();
        match interp.eval_text(&mut host, "print :nope") {
            Status::Error(e) => assert_eq!(e.message(), "nope has no value"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn load_text_reads_a_real_file_from_disk() {
        use std::fs;
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let path = dir.path().join("greet.lg");
        fs::write(&path, "to greet\nprint \"hello\nend\ngreet\n").unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut repl = Repl::new();
        let mut host = NullHost::default();
        repl.load_text(&mut host, &text);
        assert!(repl.interpreter().procs.is_defined("greet"));
        assert_eq!(host.output, b"hello\n".to_vec());
    }
}
