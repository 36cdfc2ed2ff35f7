//! The top-level read-eval loop.

mod cli;

use std::io::BufRead;
use std::process::exit;

use crate::common::SHELL_NAME;
use crate::exec;
use crate::log::{user_error, ShellLogger};

use self::cli::ShellOptions;

const PROMPT: &str = "jobsh> ";

fn usage() {
    println_ignore_io_error!("Usage: {SHELL_NAME} [-hvp]");
    println_ignore_io_error!("   -h   print this message");
    println_ignore_io_error!("   -v   print additional diagnostic information");
    println_ignore_io_error!("   -p   do not emit a command prompt");
}

pub fn main() {
    let options = match ShellOptions::from_env() {
        Ok(options) => options,
        Err(message) => {
            eprintln_ignore_io_error!("{SHELL_NAME}: {message}");
            usage();
            exit(1);
        }
    };

    if options.help {
        usage();
        exit(0);
    }

    let max_level = if options.verbose {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Info
    };
    ShellLogger::new("jobsh: ").into_global_logger(max_level);

    let _signals = match exec::register_handlers() {
        Ok(signals) => signals,
        Err(err) => {
            user_error!("cannot set up signal handling: {err}");
            exit(1);
        }
    };

    let mut input = std::io::stdin().lock();
    let mut line = String::new();

    loop {
        if options.prompt {
            print_ignore_io_error!("{PROMPT}");
        }

        line.clear();
        match input.read_line(&mut line) {
            // end of input terminates the shell
            Ok(0) => {
                println_ignore_io_error!();
                exit(0);
            }
            Ok(_) => {}
            Err(err) => {
                user_error!("cannot read input: {err}");
                exit(1);
            }
        }

        if let Err(err) = exec::eval(line.trim_end_matches(&['\n', '\r'][..])) {
            // the shell's own control primitives failed; its invariants can
            // no longer be trusted
            user_error!("{err}");
            exit(1);
        }
    }
}
