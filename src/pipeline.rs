// pipeline.rs

use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::{iter, ptr};

use libc::c_char;
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::sys::wait::{wait, WaitStatus};
use nix::unistd::{dup2, fork, pipe, write, ForkResult, Pid};
use tracing::{debug, trace, warn};

use crate::error::ExecError;
use crate::parser::{Pipeline, Stage};

/// Where the first stage reads from and the last stage writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StdStreams {
    pub input: RawFd,
    pub output: RawFd,
}

impl Default for StdStreams {
    fn default() -> Self {
        Self {
            input: libc::STDIN_FILENO,
            output: libc::STDOUT_FILENO,
        }
    }
}

#[derive(Debug)]
pub struct PipelineRun {
    /// One pid per stage, in stage order.
    pub spawned: Vec<Pid>,
    pub channels: usize,
    pub statuses: Vec<(Pid, WaitStatus)>,
}

impl PipelineRun {
    pub fn status_of(&self, pid: Pid) -> Option<WaitStatus> {
        self.statuses
            .iter()
            .find(|(p, _)| *p == pid)
            .map(|(_, status)| *status)
    }

    pub fn last_status(&self) -> Option<WaitStatus> {
        self.spawned.last().and_then(|pid| self.status_of(*pid))
    }
}

/// Both ends of one inter-stage pipe. Dropping it closes whatever is still open.
struct Channel {
    read: OwnedFd,
    write: OwnedFd,
}

impl Channel {
    fn open() -> Result<Self, ExecError> {
        let (r, w) = pipe().map_err(ExecError::Channel)?;
        // SAFETY: pipe just handed us both descriptors and nothing else owns them.
        let channel = unsafe {
            Channel {
                read: OwnedFd::from_raw_fd(r),
                write: OwnedFd::from_raw_fd(w),
            }
        };
        // Only the stage that dup2s an end onto stdin/stdout keeps it across exec.
        for fd in [&channel.read, &channel.write] {
            fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(ExecError::Channel)?;
        }
        trace!(read = r, write = w, "opened channel");
        Ok(channel)
    }
}

/// Everything a child needs, built before forking so the child never allocates.
struct Prepared<'a> {
    stage: &'a Stage,
    /// Null-terminated pointers into `stage.argv()`, ready for `execvp(3)`.
    argv: Vec<*const c_char>,
    prefix: Vec<u8>,
}

impl<'a> Prepared<'a> {
    fn new(stage: &'a Stage) -> Self {
        let argv = stage
            .argv()
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(iter::once(ptr::null()))
            .collect();
        Self {
            stage,
            argv,
            prefix: format!("sish: {}: ", stage.program()).into_bytes(),
        }
    }
}

/// Runs every stage as its own process and blocks until all children of
/// the shell have exited.
///
/// At most two channels are open at any point: the one feeding the stage
/// being spawned and the one it writes into.
pub fn execute_pipeline(pipeline: &Pipeline, streams: StdStreams) -> Result<PipelineRun, ExecError> {
    let plans: Vec<Prepared> = pipeline.stages().iter().map(Prepared::new).collect();
    let last = plans.len() - 1;

    let mut spawned = Vec::with_capacity(plans.len());
    let mut channels = 0;
    let mut prev: Option<Channel> = None;

    for (i, plan) in plans.iter().enumerate() {
        let next = if i < last {
            channels += 1;
            Some(Channel::open()?)
        } else {
            None
        };

        // SAFETY: the child only duplicates and closes descriptors before it
        // execs or _exits.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => run_child(plan, prev.take(), next, streams),
            Ok(ForkResult::Parent { child }) => {
                debug!(stage = i, pid = child.as_raw(), program = plan.stage.program(), "spawned");
                spawned.push(child);
            }
            Err(source) => {
                return Err(ExecError::Spawn {
                    program: plan.stage.program().to_string(),
                    source,
                })
            }
        }

        // Writer and reader of the previous channel both hold their own copies now.
        if let Some(done) = prev.take() {
            trace!(stage = i, "closing upstream channel in parent");
            drop(done);
        }
        prev = next;
    }

    let statuses = reap_all(&spawned)?;
    Ok(PipelineRun {
        spawned,
        channels,
        statuses,
    })
}

fn run_child(plan: &Prepared, input: Option<Channel>, output: Option<Channel>, streams: StdStreams) -> ! {
    let stdin_src = input.as_ref().map_or(streams.input, |c| c.read.as_raw_fd());
    let stdout_src = output.as_ref().map_or(streams.output, |c| c.write.as_raw_fd());

    if let Err(errno) = redirect(stdin_src, libc::STDIN_FILENO) {
        die(&[plan.prefix.as_slice(), b"cannot redirect stdin: ".as_slice(), errno.desc().as_bytes()]);
    }
    if let Err(errno) = redirect(stdout_src, libc::STDOUT_FILENO) {
        die(&[plan.prefix.as_slice(), b"cannot redirect stdout: ".as_slice(), errno.desc().as_bytes()]);
    }

    // The duplicates on 0 and 1 are all this process keeps.
    drop(input);
    drop(output);

    // The Rust runtime ignores SIGPIPE and that disposition survives exec.
    // SAFETY: installing SIG_DFL runs no handler code.
    if let Err(errno) = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) } {
        die(&[plan.prefix.as_slice(), b"cannot reset SIGPIPE: ".as_slice(), errno.desc().as_bytes()]);
    }

    // SAFETY: `argv` is null-terminated and points into CStrings the parent
    // keeps alive; libc::execvp only returns on failure.
    unsafe { libc::execvp(plan.argv[0], plan.argv.as_ptr()) };
    die(&[plan.prefix.as_slice(), Errno::last().desc().as_bytes()])
}

fn redirect(src: RawFd, target: RawFd) -> nix::Result<()> {
    if src != target {
        dup2(src, target)?;
    }
    Ok(())
}

/// Reports from inside a forked child and exits without running destructors.
fn die(parts: &[&[u8]]) -> ! {
    for part in parts {
        let _ = write(libc::STDERR_FILENO, part);
    }
    let _ = write(libc::STDERR_FILENO, b"\n");
    unsafe { libc::_exit(1) }
}

/// Drains the wait queue until no children remain, not just this pipeline's.
fn reap_all(spawned: &[Pid]) -> Result<Vec<(Pid, WaitStatus)>, ExecError> {
    let mut statuses = Vec::with_capacity(spawned.len());
    loop {
        match wait() {
            Ok(status) => match status.pid() {
                Some(pid) if spawned.contains(&pid) => {
                    debug!(pid = pid.as_raw(), ?status, "reaped");
                    statuses.push((pid, status));
                }
                other => warn!(pid = ?other, ?status, "reaped a child outside this pipeline"),
            },
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => break,
            Err(errno) => return Err(ExecError::Wait(errno)),
        }
    }
    Ok(statuses)
}

/// Tests that fork, reap or change directory share process-wide state.
#[cfg(test)]
pub(crate) fn process_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
