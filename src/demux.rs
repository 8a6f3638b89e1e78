//! Splits the combined container log back into its four channels and the exit-code pair.
//!
//! Parsing never fails. Missing sections come back empty and a missing or
//! malformed exit-code marker is reported through [`Demuxed::exit_codes`].

use crate::protocol::{
    Section, COMPILE_STDERR, COMPILE_STDOUT, EXIT_CODE_CLOSE, EXIT_CODE_OPEN, NOT_ATTEMPTED,
    RUN_STDERR, RUN_STDOUT,
};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Channels {
    pub compile_stdout: String,
    pub compile_stderr: String,
    pub run_stdout: String,
    pub run_stderr: String,
}

impl Channels {
    pub fn run_is_empty(&self) -> bool {
        self.run_stdout.is_empty() && self.run_stderr.is_empty()
    }
}

/// Exit status of the compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// Compilation failed, so nothing was run.
    NotAttempted,
    Code(i32),
}

impl RunExit {
    fn from_wire(code: i32) -> Self {
        if code == NOT_ATTEMPTED {
            RunExit::NotAttempted
        } else {
            RunExit::Code(code)
        }
    }
}

impl fmt::Display for RunExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunExit::NotAttempted => f.write_str("not attempted"),
            RunExit::Code(code) => write!(f, "{code}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes {
    pub compile: i32,
    pub run: RunExit,
}

/// Why the exit-code pair could not be recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerError {
    Missing,
    Malformed(String),
}

impl fmt::Display for MarkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerError::Missing => f.write_str("exit-code marker missing"),
            MarkerError::Malformed(text) => write!(f, "malformed exit-code marker '{text}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demuxed {
    pub channels: Channels,
    pub exit_codes: Result<ExitCodes, MarkerError>,
}

impl Demuxed {
    pub fn parse_failed(&self) -> bool {
        self.exit_codes.is_err()
    }
}

pub fn parse(raw: &str) -> Demuxed {
    let (compile_stdout, _) = section(raw, COMPILE_STDOUT);
    let (compile_stderr, compile_end) = section(raw, COMPILE_STDERR);

    // rustc quotes offending source lines, so run markers inside the compile
    // diagnostics must not be mistaken for the real run sections.
    let tail = &raw[compile_end.unwrap_or(0)..];
    let (run_stdout, _) = section(tail, RUN_STDOUT);
    let (run_stderr, _) = section(tail, RUN_STDERR);

    Demuxed {
        channels: Channels {
            compile_stdout,
            compile_stderr,
            run_stdout,
            run_stderr,
        },
        exit_codes: exit_codes(raw),
    }
}

/// Body of `section` and the offset just past its end marker.
fn section(raw: &str, section: Section) -> (String, Option<usize>) {
    let Some(start) = raw.find(section.start) else {
        return (String::new(), None);
    };
    let body_at = start + section.start.len();
    let body = &raw[body_at..];
    match body.find(section.end) {
        Some(end) => (
            body[..end].trim().to_string(),
            Some(body_at + end + section.end.len()),
        ),
        None => (String::new(), None),
    }
}

// The real marker is always the last thing the script prints, so take the last
// occurrence in case the program echoed something marker-shaped.
fn exit_codes(raw: &str) -> Result<ExitCodes, MarkerError> {
    let open = raw.rfind(EXIT_CODE_OPEN).ok_or(MarkerError::Missing)?;
    let body = &raw[open + EXIT_CODE_OPEN.len()..];
    let close = body
        .find(EXIT_CODE_CLOSE)
        .ok_or_else(|| MarkerError::Malformed(body.trim_end().to_string()))?;
    let inner = &body[..close];

    let malformed = || MarkerError::Malformed(inner.to_string());
    let (compile, run) = inner.split_once(':').ok_or_else(malformed)?;
    let compile: i32 = compile.trim().parse().map_err(|_| malformed())?;
    let run: i32 = run.trim().parse().map_err(|_| malformed())?;

    Ok(ExitCodes {
        compile,
        run: RunExit::from_wire(run),
    })
}
