// repl.rs

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dispatch::{Outcome, Shell};
use crate::history::HistoryRing;

pub fn start_repl(config: Config) -> Result<()> {
    let mut rl = DefaultEditor::new().context("failed to create line editor")?;
    let mut history = HistoryRing::with_capacity(config.history_size);
    if let Some(path) = &config.histfile {
        let loaded = load_history(&mut history, path)?;
        if !history.is_empty() {
            info!(path = %path.display(), loaded, retained = history.len(), "loaded history");
        }
    }
    let mut shell = Shell::new(history);

    let session = run_session(&mut rl, &mut shell, &config.prompt);
    finish_session(&shell, &config, session)
}

fn run_session(rl: &mut DefaultEditor, shell: &mut Shell, prompt: &str) -> Result<()> {
    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let outcome = shell
                    .dispatch(&line, &mut io::stdout(), &mut io::stderr())
                    .context("pipeline failed")?;
                if outcome == Outcome::Exit {
                    return Ok(());
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                debug!("end of input");
                return Ok(());
            }
            Err(err) => return Err(err).context("failed to read line"),
        }
    }
}

/// Saves `HISTFILE` however the session ended, then hands back its result.
fn finish_session(shell: &Shell, config: &Config, session: Result<()>) -> Result<()> {
    if let Some(path) = &config.histfile {
        // Losing the history file should not turn a clean exit into a failure.
        if let Err(e) = save_history(shell.history(), path) {
            warn!(path = %path.display(), error = %format!("{:#}", e), "could not save history");
        }
    }
    session
}

/// A missing file is an empty history.
pub fn load_history(history: &mut HistoryRing, path: &Path) -> Result<usize> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e).with_context(|| format!("cannot open HISTFILE {}", path.display())),
    };
    history
        .read_from(BufReader::new(file))
        .with_context(|| format!("cannot read HISTFILE {}", path.display()))
}

pub fn save_history(history: &HistoryRing, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create HISTFILE {}", path.display()))?;
    history
        .write_to(BufWriter::new(file))
        .with_context(|| format!("cannot write HISTFILE {}", path.display()))
}
