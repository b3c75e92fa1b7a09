//! Passphrase reading functionality

use std::io::{Read, Write};
#[cfg(any(unix, windows))]
use std::io::{StdinLock, Stdout};

use zeroize::Zeroizing;

use crate::error::Result;
use crate::input::InputReader;
#[cfg(any(unix, windows))]
use crate::terminal::{DisplayConfig, NativeConsole};
use crate::terminal::{Console, Terminal};

/// Prompt shown by `TerminalPassphraseReader::stdin`.
pub const DEFAULT_PROMPT: &str = "Passphrase: ";

/// Trait for reading passphrases from various sources
pub trait PassphraseReader {
    /// Read a passphrase as bytes.
    ///
    /// Returns the passphrase wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Reads the whole of a piped or redirected input as the passphrase.
///
/// Bytes are passed through unchanged: no ASCII check, no newline stripping.
pub struct PipedPassphraseReader<R, W> {
    input: InputReader<R, W>,
}

impl<R: Read, W: Write> PipedPassphraseReader<R, W> {
    pub fn new(input: InputReader<R, W>) -> Self {
        Self { input }
    }
}

impl<R: Read, W: Write> PassphraseReader for PipedPassphraseReader<R, W> {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let buffer = self.input.require_piped_input()?;
        Ok(buffer.into_bytes())
    }
}

/// Reads one ASCII line as the passphrase.
///
/// On a terminal the line is read with echo off inside a `TerminalSession`,
/// and a newline is printed afterwards since the user's Enter was not echoed.
/// Non-interactive input is read as a line without touching the terminal.
pub struct TerminalPassphraseReader<W: Write, C: Console, R, O> {
    terminal: Terminal<W, C>,
    input: InputReader<R, O>,
    prompt: String,
}

#[cfg(any(unix, windows))]
impl TerminalPassphraseReader<Stdout, NativeConsole, StdinLock<'static>, Stdout> {
    /// Reader on the process stdin and stdout.
    pub fn stdin(config: DisplayConfig, prompt: impl Into<String>) -> Self {
        Self::new(Terminal::stdout(config), InputReader::stdin(), prompt)
    }
}

impl<W: Write, C: Console, R: Read, O: Write> TerminalPassphraseReader<W, C, R, O> {
    pub fn new(
        terminal: Terminal<W, C>,
        input: InputReader<R, O>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            terminal,
            input,
            prompt: prompt.into(),
        }
    }

    pub fn terminal(&self) -> &Terminal<W, C> {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal<W, C> {
        &mut self.terminal
    }

    pub fn input(&self) -> &InputReader<R, O> {
        &self.input
    }
}

impl<W: Write, C: Console, R: Read, O: Write> PassphraseReader
    for TerminalPassphraseReader<W, C, R, O>
{
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !self.input.is_interactive() {
            let line = self.input.read_line(None)?;
            return Ok(Zeroizing::new(line.as_bytes().to_vec()));
        }

        let session = self.terminal.session()?;
        let line = self.input.read_line(Some(&self.prompt));
        let restored = session.finish();
        let line = line?;
        restored?;

        self.terminal.print("\n")?;
        self.terminal.refresh()?;
        Ok(Zeroizing::new(line.as_bytes().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::terminal::testing::{ECHO, FakeConsole, LINE};
    use crate::terminal::{DisplayConfig, ModeState};

    fn terminal_reader(
        data: &'static [u8],
        interactive: bool,
    ) -> TerminalPassphraseReader<Vec<u8>, FakeConsole, &'static [u8], Vec<u8>> {
        TerminalPassphraseReader::new(
            Terminal::new(Vec::new(), FakeConsole::default(), DisplayConfig::default()),
            InputReader::new(data, Vec::new(), interactive),
            "Password: ",
        )
    }

    /// Tests the terminal reader. This is ignored by default and must be run
    /// explicitly and with human input:
    ///
    /// cargo test test_terminal_reader_interactive -- --ignored --nocapture
    #[test]
    #[ignore]
    fn test_terminal_reader_interactive() {
        let mut reader = TerminalPassphraseReader::stdin(DisplayConfig::default(), DEFAULT_PROMPT);
        println!("\nPlease enter a test passphrase:");
        let passphrase = reader.read_passphrase().unwrap();
        println!("You entered: {}", String::from_utf8_lossy(&passphrase));
        assert!(!passphrase.is_empty(), "Expected non-empty passphrase");
    }

    #[test]
    fn test_terminal_reader_hides_input() {
        let mut reader = terminal_reader(b"hunter2\r\n", true);
        assert_eq!(&*reader.read_passphrase().unwrap(), b"hunter2");

        assert_eq!(reader.input().output().as_slice(), b"Password: ");
        let terminal = reader.terminal();
        assert_eq!(terminal.console().captures, 1);
        assert_eq!(terminal.console().mode, ECHO | LINE);
        assert_eq!(terminal.state(), ModeState::Uninitialized);
        assert!(terminal.output().ends_with(b"\n"));
    }

    #[test]
    fn test_terminal_reader_restores_on_error() {
        let mut reader = terminal_reader(b"caf\xc3\xa9\n", true);
        let err = reader.read_passphrase().unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::NonAsciiInput));
        assert_eq!(reader.terminal().console().mode, ECHO | LINE);
        assert_eq!(reader.terminal().state(), ModeState::Uninitialized);
    }

    #[test]
    fn test_terminal_reader_from_pipe() {
        let mut reader = terminal_reader(b"piped secret\n", false);
        assert_eq!(&*reader.read_passphrase().unwrap(), b"piped secret");
        assert_eq!(reader.terminal().console().captures, 0);
        assert!(reader.input().output().is_empty());
        assert!(reader.terminal().output().is_empty());
    }

    #[test]
    fn test_terminal_reader_empty_line() {
        let mut reader = terminal_reader(b"\n", true);
        let err = reader.read_passphrase().unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::NoInput));
    }

    #[test]
    fn test_piped_reader() {
        let data = b"mypassword\n";
        let mut reader =
            PipedPassphraseReader::new(InputReader::new(&data[..], Vec::new(), false));
        assert_eq!(&*reader.read_passphrase().unwrap(), b"mypassword\n");
    }

    #[test]
    fn test_piped_reader_empty() {
        let data = b"";
        let mut reader =
            PipedPassphraseReader::new(InputReader::new(&data[..], Vec::new(), false));
        let err = reader.read_passphrase().unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::NoInput));
    }

    #[test]
    fn test_piped_reader_rejects_terminal() {
        let data = b"mypassword";
        let mut reader = PipedPassphraseReader::new(InputReader::new(&data[..], Vec::new(), true));
        let err = reader.read_passphrase().unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::InteractiveInputNotAllowed));
    }

    /// Verifies that PipedPassphraseReader accepts arbitrary byte sequences,
    /// not just ASCII.
    #[test]
    fn test_piped_reader_non_ascii() {
        let data: &[u8] = &[0xff, 0xfe, 0x00, 0x01];
        let mut reader = PipedPassphraseReader::new(InputReader::new(data, Vec::new(), false));
        assert_eq!(&*reader.read_passphrase().unwrap(), data);
    }
}
