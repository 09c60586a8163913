//! Operator console for camlink devices.
//!
//! A line-based front end over [`camlink_client::Runtime`]: operator input is
//! parsed by [`commands`], view updates are printed by [`view`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod commands;
pub mod view;

use std::io::{self, Write};

use camlink_client::{TransportError, ViewSink};
use camlink_core::{SessionError, ViewUpdate};

/// Console failures.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// Transport setup failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Terminal I/O failed.
    #[error("console I/O: {0}")]
    Io(#[from] io::Error),
}

/// View sink that writes every update as text lines.
pub struct PrintSink<W: Write> {
    out: W,
}

impl<W: Write> PrintSink<W> {
    /// Sink writing to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// The writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        // Best effort.
        let _ = writeln!(self.out, "{text}");
    }
}

impl<W: Write> ViewSink for PrintSink<W> {
    fn view(&mut self, device: &str, update: &ViewUpdate) {
        for line in view::render(device, update) {
            self.line(&line);
        }
    }

    fn connectivity(&mut self, connected: bool) {
        self.line(if connected { "* connected" } else { "* disconnected, retrying" });
    }

    fn refused(&mut self, command: &str, error: &SessionError) {
        self.line(&format!("! {command}: {error}"));
    }
}
