//! `ulogo` binary entry point: dispatches into the `cli` module, gated
//! behind the `cli` feature so the library half stays buildable with
//! no CLI surface for embedded targets.

fn main() {
    if let Err(e) = ulogo::cli::run_cli() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
