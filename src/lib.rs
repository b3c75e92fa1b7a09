//! secretio - hidden passphrase input and terminal mode control
//!
//! Reads secrets either from an interactive terminal, one line at a time with
//! echo off, or from a pipe, to end of stream. The terminal layer saves the
//! console mode on entry and restores it when the session ends.

#![deny(unsafe_code)]

pub mod buffer;
pub mod error;
pub mod input;
pub mod passphrase;
pub mod terminal;

pub use buffer::InputBuffer;
pub use error::{ErrorCategory, ErrorKind, Result, SecretioError};
pub use input::{InputReader, SecretLine};
pub use terminal::{DisplayConfig, ForegroundColor, Terminal, TerminalSession};
