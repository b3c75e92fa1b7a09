//! Line-oriented secret input from a terminal or a pipe
//!
//! `InputReader` reads bytes one at a time from its input stream. Whether the
//! stream is interactive decides when reading stops: a terminal read ends
//! after the first newline, while piped or redirected input is read to end of
//! stream so multi-line secrets arrive as one blob.

use std::fmt;
use std::io::{self, IsTerminal, Read, StdinLock, Stdout, Write};

use zeroize::Zeroizing;

use crate::buffer::InputBuffer;
use crate::error::{ErrorCategory, ErrorKind, Result, SecretioError};

/// Validated ASCII line with its terminator removed.
///
/// The contents are zeroed when dropped.
pub struct SecretLine(Zeroizing<String>);

impl SecretLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Zeroizing<String> {
        self.0
    }
}

impl fmt::Debug for SecretLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretLine")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Reads secret input from `input`, writing prompts to `output`.
pub struct InputReader<R = StdinLock<'static>, W = Stdout> {
    input: R,
    output: W,
    interactive: bool,
}

impl InputReader {
    /// Reader over the process stdin, prompting on stdout.
    ///
    /// Interactivity is detected by checking whether stdin is a terminal.
    pub fn stdin() -> Self {
        let stdin = io::stdin();
        let interactive = stdin.is_terminal();
        Self::new(stdin.lock(), io::stdout(), interactive)
    }
}

impl<R: Read, W: Write> InputReader<R, W> {
    pub fn new(input: R, output: W, interactive: bool) -> Self {
        Self {
            input,
            output,
            interactive,
        }
    }

    /// Whether the input stream is attached to a terminal.
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_parts(self) -> (R, W) {
        (self.input, self.output)
    }

    /// Reads raw bytes until end of stream or, on a terminal, through the
    /// first newline.
    ///
    /// The prompt is only shown on a terminal. An immediate end of stream is
    /// not an error: it yields an empty, unallocated buffer and the caller
    /// decides whether empty input is acceptable.
    pub fn read_raw(&mut self, prompt: Option<&str>) -> Result<InputBuffer> {
        if self.interactive {
            if let Some(prompt) = prompt {
                self.write_prompt(prompt)?;
            }
        }

        let mut buffer = InputBuffer::new();
        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    let value = if self.interactive {
                        console_enter(byte[0])
                    } else {
                        byte[0]
                    };
                    buffer.push(value)?;
                    if self.interactive && value == b'\n' {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!(read = buffer.len(), "input read failed: {}", e);
                    return Err(SecretioError::io(format!("input read error: {}", e), e));
                }
            }
        }

        tracing::debug!(
            len = buffer.len(),
            interactive = self.interactive,
            "raw input read"
        );
        Ok(buffer)
    }

    /// Reads one line of ASCII text with the trailing `\n` or `\r\n` removed.
    ///
    /// Fails with `NoInput` if nothing remains after stripping and with
    /// `NonAsciiInput` if any byte is outside the ASCII range. No partial
    /// line is returned on failure.
    pub fn read_line(&mut self, prompt: Option<&str>) -> Result<SecretLine> {
        let buffer = self
            .read_raw(prompt)
            .map_err(|e| e.with_context("could not get input"))?;
        normalize_line(buffer)
    }

    /// Reads all of a piped or redirected stdin, refusing a terminal.
    ///
    /// Unlike `read_raw`, empty input is an error here.
    pub fn require_piped_input(&mut self) -> Result<InputBuffer> {
        if self.interactive {
            return Err(SecretioError::with_kind(
                ErrorCategory::User,
                ErrorKind::InteractiveInputNotAllowed,
                "input data from a piped or redirected source is required",
            ));
        }

        let buffer = self
            .read_raw(None)
            .map_err(|e| e.with_context("could not get input"))?;
        if buffer.is_empty() {
            return Err(no_input());
        }
        Ok(buffer)
    }

    fn write_prompt(&mut self, prompt: &str) -> Result<()> {
        self.output
            .write_all(prompt.as_bytes())
            .map_err(|e| SecretioError::io(format!("failed to write prompt: {}", e), e))?;
        self.output
            .flush()
            .map_err(|e| SecretioError::io(format!("failed to flush prompt: {}", e), e))
    }
}

/// A Windows console with line input off delivers Enter as `\r`.
#[cfg(windows)]
fn console_enter(byte: u8) -> u8 {
    if byte == b'\r' { b'\n' } else { byte }
}

#[cfg(not(windows))]
fn console_enter(byte: u8) -> u8 {
    byte
}

/// Strips one trailing `\n` (and a `\r` before it) and validates the rest as
/// ASCII.
pub fn normalize_line(mut buffer: InputBuffer) -> Result<SecretLine> {
    if buffer.last() == Some(b'\n') {
        buffer.pop();
        if buffer.last() == Some(b'\r') {
            buffer.pop();
        }
    }

    if buffer.is_empty() {
        return Err(no_input());
    }

    if let Some(pos) = buffer.iter().position(|b| !b.is_ascii()) {
        tracing::debug!(offset = pos, "rejecting non-ascii input");
        return Err(SecretioError::with_kind(
            ErrorCategory::User,
            ErrorKind::NonAsciiInput,
            "input contains non-ascii characters",
        ));
    }

    let mut line = Zeroizing::new(String::with_capacity(buffer.len()));
    line.extend(buffer.iter().map(|&b| char::from(b)));
    Ok(SecretLine(line))
}

fn no_input() -> SecretioError {
    SecretioError::with_kind(ErrorCategory::User, ErrorKind::NoInput, "no input provided")
}
