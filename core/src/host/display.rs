//! Display output collaborator
//!
//! Where `print` output and load/hook errors go. Errors are attributed to a
//! file and, when the message carries one, a line.

use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Out,
    Err,
}

pub trait DisplayOutput: Send + Sync {
    fn write(&self, kind: OutputKind, message: &str);
}

/// Routes output to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDisplay;

impl DisplayOutput for TracingDisplay {
    fn write(&self, kind: OutputKind, message: &str) {
        match kind {
            OutputKind::Out => info!(target: "edscript::display", "{}", message),
            OutputKind::Err => warn!(target: "edscript::display", "{}", message),
        }
    }
}

/// Writes to the process's stdout and stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDisplay;

impl DisplayOutput for StdDisplay {
    fn write(&self, kind: OutputKind, message: &str) {
        match kind {
            OutputKind::Out => println!("{}", message),
            OutputKind::Err => eprintln!("{}", message),
        }
    }
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct CollectingDisplay {
    lines: Mutex<Vec<(OutputKind, String)>>,
}

impl CollectingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(OutputKind, String)> {
        self.lines.lock().clone()
    }

    pub fn out(&self) -> Vec<String> {
        self.of_kind(OutputKind::Out)
    }

    pub fn errors(&self) -> Vec<String> {
        self.of_kind(OutputKind::Err)
    }

    fn of_kind(&self, kind: OutputKind) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, line)| line.clone())
            .collect()
    }
}

impl DisplayOutput for CollectingDisplay {
    fn write(&self, kind: OutputKind, message: &str) {
        self.lines.lock().push((kind, message.to_string()));
    }
}

/// File and line a message is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub path: String,
    pub line: Option<u32>,
}

/// Find a leading `path:line:` in an error message
pub fn attribute(message: &str) -> Option<Attribution> {
    for (i, _) in message.match_indices(':') {
        if i == 0 {
            continue;
        }
        let rest = &message[i + 1..];
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 || !rest[digits..].starts_with(':') {
            continue;
        }
        let line = rest[..digits].parse().ok();
        return Some(Attribution {
            path: message[..i].to_string(),
            line,
        });
    }
    None
}

/// Report an error about `path`, prefixing the path unless the message
/// already names its location
pub fn report_error(display: &dyn DisplayOutput, path: &str, message: &str) {
    if attribute(message).is_some() {
        display.write(OutputKind::Err, message);
    } else {
        display.write(OutputKind::Err, &format!("{}: {}", path, message));
    }
}
