//! The `protoprimer` kernel binary.
//!
//! Copied (or wrapped by an entry script) into a repository as its
//! proto-code. Every invocation captures the process, runs one bootstrap
//! and exits with its status; relay strides replace the process in between.

use std::process;

use protoprimer_env::{app_main, Runtime};

fn main() {
    let rt = match Runtime::from_process() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: cannot inspect the current process: {}", e);
            process::exit(1);
        }
    };
    process::exit(app_main(rt));
}
