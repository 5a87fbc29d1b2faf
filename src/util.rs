// util.rs

use std::io::{self, Write};

/// Writes one line, treating a closed reader as success.
pub fn writeln_ignore_broken_pipe<W: Write + ?Sized, S: AsRef<str>>(w: &mut W, s: S) -> io::Result<()> {
    match writeln!(w, "{}", s.as_ref()) {
        Err(ref e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

/// Reports a user-visible error without interrupting the prompt loop.
pub fn report<W: Write + ?Sized>(err: &mut W, message: impl std::fmt::Display) {
    let _ = writeln_ignore_broken_pipe(err, format!("sish: {}", message));
    let _ = err.flush();
}
