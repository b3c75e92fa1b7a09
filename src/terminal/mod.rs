//! Terminal mode control and reveal rendering
//!
//! `Terminal` owns the output stream and a platform `Console`. The first call
//! to `enter_raw_mode()` captures the console's original mode; every later
//! `restore_mode()` puts that mode back. Callers normally go through
//! `session()`, whose guard restores the terminal when it goes out of scope.

mod config;
mod console;

use std::io::{self, Write};
use std::ops::{Deref, DerefMut};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::queue;
use crossterm::style::{Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};

pub use self::config::{DisplayConfig, ForegroundColor};
pub use self::console::Console;
#[cfg(any(unix, windows))]
pub use self::console::{NativeConsole, emergency_restore};
#[cfg(windows)]
pub use self::console::ConsoleModes;

use crate::error::{ErrorCategory, ErrorKind, Result, SecretioError};

/// Rows reported when the viewport size cannot be queried.
pub const DEFAULT_ROWS: u16 = 25;
/// Columns reported when the viewport size cannot be queried.
pub const DEFAULT_COLS: u16 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeState {
    Uninitialized,
    RawModeActive,
}

pub struct Terminal<W: Write, C: Console> {
    out: W,
    console: C,
    config: DisplayConfig,
    saved: Option<C::Mode>,
    cursor_hidden: bool,
    state: ModeState,
}

#[cfg(any(unix, windows))]
impl Terminal<io::Stdout, NativeConsole> {
    /// Terminal on the process stdout and the platform console.
    pub fn stdout(config: DisplayConfig) -> Self {
        Self::new(io::stdout(), NativeConsole::new(), config)
    }
}

impl<W: Write, C: Console> Terminal<W, C> {
    pub fn new(out: W, console: C, config: DisplayConfig) -> Self {
        Self {
            out,
            console,
            config,
            saved: None,
            cursor_hidden: false,
            state: ModeState::Uninitialized,
        }
    }

    pub fn config(&self) -> DisplayConfig {
        self.config
    }

    pub fn state(&self) -> ModeState {
        self.state
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn clear_screen(&self) -> bool {
        self.config.clear_screen
    }

    pub fn set_clear_screen(&mut self, clear: bool) {
        self.config.clear_screen = clear;
    }

    pub fn foreground(&self) -> ForegroundColor {
        self.config.foreground
    }

    pub fn set_foreground(&mut self, color: ForegroundColor) {
        self.config.foreground = color;
    }

    /// Turns off echo and line buffering.
    ///
    /// The original mode is captured on the first call only, so entering
    /// twice and restoring once still returns to the pre-entry mode.
    pub fn enter_raw_mode(&mut self) -> Result<()> {
        if self.saved.is_none() {
            let mode = self.console.capture_mode().map_err(|e| {
                SecretioError::io(format!("failed to read console mode: {}", e), e)
            })?;
            self.saved = Some(mode);
            tracing::debug!("captured original console mode");
        }
        if let Some(original) = self.saved.as_ref() {
            if let Err(e) = self.console.apply_quiet_mode(original) {
                // A partly applied switch is undone.
                if let Err(restore) = self.console.apply_mode(original) {
                    tracing::warn!("failed to restore console mode: {}", restore);
                }
                return Err(SecretioError::io(format!("failed to set console mode: {}", e), e));
            }
        }
        self.state = ModeState::RawModeActive;
        tracing::debug!("entered raw mode");

        if self.config.clear_screen {
            self.cursor_hidden = true;
            let cleared =
                queue!(self.out, ResetColor, Clear(ClearType::All), MoveTo(0, 0), Hide)
                    .and_then(|()| self.out.flush());
            if let Err(e) = cleared {
                // The caller holds no session guard yet.
                if let Err(restore) = self.restore_mode() {
                    tracing::warn!("failed to restore terminal: {:#}", restore);
                }
                return Err(SecretioError::io(format!("failed to clear screen: {}", e), e));
            }
        }
        Ok(())
    }

    /// Puts back the captured mode and, if hidden here, the cursor.
    ///
    /// Does nothing if raw mode was never entered; safe to call repeatedly.
    pub fn restore_mode(&mut self) -> Result<()> {
        let mut result = Ok(());
        if let Some(mode) = self.saved.as_ref() {
            if let Err(e) = self.console.apply_mode(mode) {
                result = Err(SecretioError::io(
                    format!("failed to restore console mode: {}", e),
                    e,
                ));
            } else if self.state == ModeState::RawModeActive {
                tracing::debug!("restored original console mode");
            }
        }
        if self.cursor_hidden {
            let shown = self.show_cursor();
            if result.is_ok() {
                result = shown;
            }
        }
        self.state = ModeState::Uninitialized;
        result
    }

    /// Enters raw mode and returns a guard that restores it.
    pub fn session(&mut self) -> Result<TerminalSession<'_, W, C>> {
        self.enter_raw_mode()?;
        Ok(TerminalSession {
            terminal: self,
            active: true,
        })
    }

    pub fn show_cursor(&mut self) -> Result<()> {
        queue!(self.out, Show)
            .and_then(|()| self.out.flush())
            .map_err(|e| SecretioError::io(format!("failed to show cursor: {}", e), e))?;
        self.cursor_hidden = false;
        Ok(())
    }

    /// Moves the cursor within the visible viewport.
    ///
    /// `row <= 0` is the top row, otherwise `row` counts from 1 at the top.
    /// `col` is 0-based.
    pub fn move_cursor(&mut self, row: i32, col: i32) -> Result<()> {
        let col = u16::try_from(col).map_err(|e| {
            SecretioError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::InvalidArgument,
                format!("cursor column {} out of range", col),
                e,
            )
        })?;
        let row = if row <= 0 {
            0
        } else {
            u16::try_from(row - 1).map_err(|e| {
                SecretioError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::InvalidArgument,
                    format!("cursor row {} out of range", row),
                    e,
                )
            })?
        };
        queue!(self.out, MoveTo(col, row))
            .and_then(|()| self.out.flush())
            .map_err(|e| SecretioError::io(format!("failed to move cursor: {}", e), e))
    }

    pub fn beep(&mut self) -> Result<()> {
        self.out
            .write_all(b"\x07")
            .and_then(|()| self.out.flush())
            .map_err(|e| SecretioError::io(format!("failed to ring bell: {}", e), e))
    }

    /// Visible rows, or `DEFAULT_ROWS` if the console cannot be queried.
    pub fn rows(&self) -> u16 {
        match self.console.size() {
            Ok((_, rows)) => rows,
            Err(e) => {
                tracing::warn!("terminal size query failed: {}", e);
                DEFAULT_ROWS
            }
        }
    }

    /// Visible columns, or `DEFAULT_COLS` if the console cannot be queried.
    pub fn cols(&self) -> u16 {
        match self.console.size() {
            Ok((cols, _)) => cols,
            Err(e) => {
                tracing::warn!("terminal size query failed: {}", e);
                DEFAULT_COLS
            }
        }
    }

    /// 1-based cursor row within the viewport, or 0 if unknown.
    pub fn cursor_row(&self) -> u16 {
        match self.console.cursor_position() {
            Ok((_, row)) => row.saturating_add(1),
            Err(e) => {
                tracing::warn!("cursor position query failed: {}", e);
                0
            }
        }
    }

    pub fn print(&mut self, text: &str) -> Result<()> {
        queue!(self.out, Print(text))
            .map_err(|e| SecretioError::io(format!("failed to write output: {}", e), e))
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.out
            .flush()
            .map_err(|e| SecretioError::io(format!("failed to flush output: {}", e), e))
    }

    /// Writes `text` in the configured foreground color, or in the default
    /// colors if `color_on` is false.
    ///
    /// Colors are reset afterwards even if writing the text failed. Text that
    /// is not valid UTF-8 is written as raw bytes.
    pub fn print_reveal(&mut self, text: &[u8], color_on: bool) -> Result<()> {
        let color = self.config.foreground.to_color();
        let written = if color_on {
            queue!(self.out, SetForegroundColor(color))
        } else {
            queue!(self.out, ResetColor)
        }
        .and_then(|()| write_text(&mut self.out, text));

        let reset = queue!(self.out, ResetColor).and_then(|()| self.out.flush());

        match (written, reset) {
            (Err(e), _) | (Ok(()), Err(e)) => Err(SecretioError::io(
                format!("failed to write reveal text: {}", e),
                e,
            )),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    /// Blocks until a key is pressed.
    pub fn read_char(&mut self) -> Result<char> {
        self.console
            .read_char()
            .map_err(|e| SecretioError::io(format!("failed to read key: {}", e), e))
    }

    /// Discards pending unread input.
    pub fn clear_input(&mut self) -> Result<()> {
        self.console
            .clear_input()
            .map_err(|e| SecretioError::io(format!("failed to clear input: {}", e), e))
    }
}

fn write_text<W: Write>(out: &mut W, text: &[u8]) -> io::Result<()> {
    match std::str::from_utf8(text) {
        Ok(s) => queue!(out, Print(s)),
        Err(_) => out.write_all(text),
    }
}

/// Raw mode held for the lifetime of the value.
///
/// Dropping the session restores the terminal, logging any failure. Use
/// `finish()` to observe restore errors.
pub struct TerminalSession<'a, W: Write, C: Console> {
    terminal: &'a mut Terminal<W, C>,
    active: bool,
}

impl<W: Write, C: Console> TerminalSession<'_, W, C> {
    pub fn finish(mut self) -> Result<()> {
        self.active = false;
        self.terminal.restore_mode()
    }
}

impl<W: Write, C: Console> Deref for TerminalSession<'_, W, C> {
    type Target = Terminal<W, C>;

    fn deref(&self) -> &Terminal<W, C> {
        self.terminal
    }
}

impl<W: Write, C: Console> DerefMut for TerminalSession<'_, W, C> {
    fn deref_mut(&mut self) -> &mut Terminal<W, C> {
        self.terminal
    }
}

impl<W: Write, C: Console> Drop for TerminalSession<'_, W, C> {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = self.terminal.restore_mode() {
                tracing::warn!("failed to restore terminal: {:#}", e);
            }
        }
    }
}
