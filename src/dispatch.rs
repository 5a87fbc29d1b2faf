// dispatch.rs

use std::io::Write;

use tracing::{debug, warn};

use crate::builtins::{change_directory, print_history, Builtin, HistoryRequest};
use crate::error::ExecError;
use crate::history::HistoryRing;
use crate::parser::parse_pipeline;
use crate::pipeline::{execute_pipeline, StdStreams};
use crate::util::report;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Exit,
}

/// Routes input lines to builtins or the pipeline executor and keeps the
/// command history.
pub struct Shell {
    history: HistoryRing,
    streams: StdStreams,
}

impl Shell {
    pub fn new(history: HistoryRing) -> Self {
        Self::with_streams(history, StdStreams::default())
    }

    pub fn with_streams(history: HistoryRing, streams: StdStreams) -> Self {
        Self { history, streams }
    }

    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    /// Handles one line typed at the prompt, following `history n` replays
    /// until a line actually runs.
    ///
    /// The typed line is recorded at most once however long the replay chain
    /// gets; replayed text is never recorded. Only pipeline failures that
    /// must stop the shell come back as errors, everything else is reported
    /// on `err`.
    pub fn dispatch<O, E>(&mut self, line: &str, out: &mut O, err: &mut E) -> Result<Outcome, ExecError>
    where
        O: Write + ?Sized,
        E: Write + ?Sized,
    {
        let mut current = line.to_string();
        let mut recorded = false;

        loop {
            if current.trim().is_empty() {
                return Ok(Outcome::Continue);
            }
            let pipeline = match parse_pipeline(&current) {
                Ok(pipeline) => pipeline,
                Err(e) => {
                    report(err, e);
                    return Ok(Outcome::Continue);
                }
            };
            let stage = pipeline.first();

            match Builtin::classify(stage.program()) {
                Some(Builtin::Exit) => return Ok(Outcome::Exit),
                Some(Builtin::Cd) => {
                    if let Err(message) = change_directory(stage.args()) {
                        report(err, message);
                    }
                    self.record(line, &mut recorded);
                }
                Some(Builtin::History) => match HistoryRequest::parse(stage.args()) {
                    HistoryRequest::List => {
                        self.record(line, &mut recorded);
                        if let Err(e) = print_history(&self.history, out) {
                            warn!(error = %e, "could not print history");
                        }
                    }
                    HistoryRequest::Clear => {
                        self.record(line, &mut recorded);
                        self.history.clear();
                    }
                    HistoryRequest::Replay(n) => {
                        // Look up before recording: recording may move the head.
                        let Some(text) = self.history.resolve(n).map(str::to_owned) else {
                            report(err, format!("history: {}: no such entry", n));
                            return Ok(Outcome::Continue);
                        };
                        self.record(line, &mut recorded);
                        debug!(index = n, replay = %text, "replaying history entry");
                        current = text;
                        continue;
                    }
                    HistoryRequest::Invalid(arg) => {
                        report(err, format!("history: {}: invalid argument", arg));
                    }
                },
                None => {
                    debug!(%pipeline, stages = pipeline.len(), "executing");
                    let run = execute_pipeline(&pipeline, self.streams)?;
                    debug!(status = ?run.last_status(), "pipeline finished");
                    self.record(line, &mut recorded);
                }
            }
            return Ok(Outcome::Continue);
        }
    }

    fn record(&mut self, line: &str, recorded: &mut bool) {
        if !*recorded {
            self.history.enqueue(line);
            *recorded = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::process_lock;
    use std::fs::File;
    use std::io::{Read, Seek, SeekFrom};
    use std::os::unix::io::AsRawFd;

    struct Harness {
        shell: Shell,
        _input: File,
        output: File,
    }

    impl Harness {
        fn new(capacity: usize, seeded: &[&str]) -> Self {
            let input = File::open("/dev/null").unwrap();
            let output = tempfile::tempfile().unwrap();
            let mut history = HistoryRing::with_capacity(capacity);
            for cmd in seeded {
                history.enqueue(cmd);
            }
            let streams = StdStreams {
                input: input.as_raw_fd(),
                output: output.as_raw_fd(),
            };
            Self {
                shell: Shell::with_streams(history, streams),
                _input: input,
                output,
            }
        }

        /// Returns (outcome, builtin stdout, error stream).
        fn run(&mut self, line: &str) -> (Outcome, String, String) {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let outcome = self.shell.dispatch(line, &mut out, &mut err).unwrap();
            (
                outcome,
                String::from_utf8(out).unwrap(),
                String::from_utf8(err).unwrap(),
            )
        }

        fn program_output(&mut self) -> String {
            self.output.seek(SeekFrom::Start(0)).unwrap();
            let mut text = String::new();
            self.output.read_to_string(&mut text).unwrap();
            text
        }

        fn history(&self) -> Vec<String> {
            self.shell
                .history()
                .list()
                .map(|(_, text)| text.to_string())
                .collect()
        }
    }

    #[test]
    fn history_lists_itself_last() {
        let mut h = Harness::new(100, &["a", "b", "c"]);
        let (outcome, out, err) = h.run("history");
        assert_eq!(outcome, Outcome::Continue);
        assert_eq!(out, "0 a\n1 b\n2 c\n3 history\n");
        assert!(err.is_empty());
    }

    #[test]
    fn history_clear_leaves_only_the_next_command() {
        let mut h = Harness::new(100, &["a", "b", "c"]);
        let (_, out, _) = h.run("history -c");
        assert!(out.is_empty());
        assert!(h.shell.history().is_empty());

        let (_, out, _) = h.run("history");
        assert_eq!(out, "0 history\n");
    }

    #[test]
    fn replay_runs_entry_and_records_trigger() {
        let _lock = process_lock();
        let mut h = Harness::new(100, &["echo a", "echo b", "echo c"]);
        let (outcome, out, err) = h.run("history 1");
        assert_eq!(outcome, Outcome::Continue);
        assert!(out.is_empty());
        assert!(err.is_empty());
        assert_eq!(h.program_output(), "b\n");
        assert_eq!(h.history(), ["echo a", "echo b", "echo c", "history 1"]);
    }

    #[test]
    fn replay_resolves_before_recording() {
        let _lock = process_lock();
        let mut h = Harness::new(3, &["echo x", "echo y", "echo z"]);
        h.run("history 0");
        assert_eq!(h.program_output(), "x\n");
        assert_eq!(h.history(), ["echo y", "echo z", "history 0"]);
    }

    #[test]
    fn replay_chains_record_once() {
        let _lock = process_lock();
        let mut h = Harness::new(100, &["echo a", "history 0"]);
        h.run("history 1");
        assert_eq!(h.program_output(), "a\n");
        assert_eq!(h.history(), ["echo a", "history 0", "history 1"]);
    }

    #[test]
    fn replay_of_list_prints_with_trigger_recorded() {
        let mut h = Harness::new(100, &["history"]);
        let (_, out, _) = h.run("history 0");
        assert_eq!(out, "0 history\n1 history 0\n");
    }

    #[test]
    fn replay_of_empty_slot_is_reported() {
        let mut h = Harness::new(100, &[]);
        let (outcome, _, err) = h.run("history 5");
        assert_eq!(outcome, Outcome::Continue);
        assert_eq!(err, "sish: history: 5: no such entry\n");
        assert!(h.shell.history().is_empty());
    }

    #[test]
    fn invalid_history_argument_is_reported_and_not_recorded() {
        let mut h = Harness::new(100, &["a"]);
        let (outcome, out, err) = h.run("history -x");
        assert_eq!(outcome, Outcome::Continue);
        assert!(out.is_empty());
        assert_eq!(err, "sish: history: -x: invalid argument\n");
        assert_eq!(h.history(), ["a"]);
    }

    #[test]
    fn exit_is_not_recorded() {
        let mut h = Harness::new(100, &[]);
        let (outcome, _, _) = h.run("exit");
        assert_eq!(outcome, Outcome::Exit);
        assert!(h.shell.history().is_empty());
    }

    #[test]
    fn replay_can_exit() {
        let mut h = Harness::new(100, &["exit"]);
        let (outcome, _, _) = h.run("history 0");
        assert_eq!(outcome, Outcome::Exit);
        assert_eq!(h.history(), ["exit", "history 0"]);
    }

    #[test]
    fn blank_and_malformed_lines_are_skipped() {
        let mut h = Harness::new(100, &[]);
        let (outcome, _, err) = h.run("   ");
        assert_eq!(outcome, Outcome::Continue);
        assert!(err.is_empty());

        let (outcome, _, err) = h.run("ls |");
        assert_eq!(outcome, Outcome::Continue);
        assert_eq!(err, "sish: syntax error: empty command at pipeline stage 1\n");
        assert!(h.shell.history().is_empty());
    }

    #[test]
    fn failed_cd_is_reported_and_recorded() {
        let _lock = process_lock();
        let mut h = Harness::new(100, &[]);
        let (outcome, _, err) = h.run("cd /sish/definitely/not/here");
        assert_eq!(outcome, Outcome::Continue);
        assert!(err.starts_with("sish: cd: /sish/definitely/not/here: "));
        assert_eq!(h.history(), ["cd /sish/definitely/not/here"]);
    }

    #[test]
    fn pipelines_run_and_record_raw_line() {
        let _lock = process_lock();
        let mut h = Harness::new(100, &[]);
        let line = "echo hi  |  tr a-z A-Z";
        let (outcome, out, err) = h.run(line);
        assert_eq!(outcome, Outcome::Continue);
        assert!(out.is_empty());
        assert!(err.is_empty());
        assert_eq!(h.program_output(), "HI\n");
        assert_eq!(h.history(), [line]);
    }
}
