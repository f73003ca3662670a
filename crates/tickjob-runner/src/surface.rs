//! The foreground console an attended pipeline runs in.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Size and title of the console window for an attended run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSurface {
    pub title: String,
    pub columns: u16,
    pub lines: u16,
}

impl Default for ConsoleSurface {
    fn default() -> Self {
        Self {
            title: "Realtime Monitor".to_string(),
            columns: 120,
            lines: 40,
        }
    }
}

/// Prepares the console before an attended pipeline starts.
pub trait SurfaceAllocator: Send + Sync {
    fn allocate(&self, surface: &ConsoleSurface) -> Result<()>;
}

/// Resizes and titles the console the process is attached to.
///
/// On Windows this goes through `mode con` and `title`; elsewhere it writes
/// the xterm escape sequences, which terminals that do not support them ignore.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalAllocator;

impl SurfaceAllocator for TerminalAllocator {
    #[cfg(windows)]
    fn allocate(&self, surface: &ConsoleSurface) -> Result<()> {
        use std::process::Command;

        let size = format!("mode con: cols={} lines={}", surface.columns, surface.lines);
        Command::new("cmd").args(["/C", &size]).status()?;
        Command::new("cmd")
            .args(["/C", "title", &surface.title])
            .status()?;
        debug!(columns = surface.columns, lines = surface.lines, "console resized");
        Ok(())
    }

    #[cfg(not(windows))]
    fn allocate(&self, surface: &ConsoleSurface) -> Result<()> {
        use std::io::Write;

        let mut out = std::io::stdout().lock();
        write!(out, "\x1b]0;{}\x07", surface.title)?;
        write!(out, "\x1b[8;{};{}t", surface.lines, surface.columns)?;
        out.flush()?;
        debug!(columns = surface.columns, lines = surface.lines, "console resized");
        Ok(())
    }
}
