// builtins.rs

use std::env;
use std::io::{self, Write};

use crate::history::HistoryRing;
use crate::util::writeln_ignore_broken_pipe;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Exit,
    Cd,
    History,
}

impl Builtin {
    /// `exit` must match exactly; `cd` and `history` match as prefixes.
    pub fn classify(program: &str) -> Option<Self> {
        if program == "exit" {
            Some(Builtin::Exit)
        } else if program.starts_with("cd") {
            Some(Builtin::Cd)
        } else if program.starts_with("history") {
            Some(Builtin::History)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryRequest {
    List,
    Clear,
    Replay(usize),
    Invalid(String),
}

impl HistoryRequest {
    /// Only the first argument is looked at.
    pub fn parse(args: &[String]) -> Self {
        match args.first().map(String::as_str) {
            None => HistoryRequest::List,
            Some("-c") => HistoryRequest::Clear,
            Some(arg) if !arg.is_empty() && arg.bytes().all(|b| b.is_ascii_digit()) => match arg.parse() {
                Ok(n) => HistoryRequest::Replay(n),
                Err(_) => HistoryRequest::Invalid(arg.to_string()),
            },
            Some(arg) => HistoryRequest::Invalid(arg.to_string()),
        }
    }
}

pub fn print_history<W: Write + ?Sized>(history: &HistoryRing, out: &mut W) -> io::Result<()> {
    for (index, text) in history.list() {
        writeln_ignore_broken_pipe(out, format!("{} {}", index, text))?;
    }
    out.flush()
}

/// Changes to the sole argument of `cd`, describing any failure.
pub fn change_directory(args: &[String]) -> Result<(), String> {
    let target = args.first().ok_or_else(|| "cd: missing argument".to_string())?;
    env::set_current_dir(target).map_err(|e| format!("cd: {}: {}", target, e))
}
