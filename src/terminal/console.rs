//! Platform console primitives
//!
//! `Console` is the part of terminal control that differs per platform: saving
//! and switching the input mode. Geometry, key reads and input flushing have
//! crossterm-backed default implementations shared by every platform.

use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};

pub trait Console {
    /// Saved console mode, as captured before any change.
    type Mode;

    /// Reads the current console mode.
    fn capture_mode(&mut self) -> io::Result<Self::Mode>;

    /// Switches to a mode derived from `original` with echo and line
    /// buffering off.
    fn apply_quiet_mode(&mut self, original: &Self::Mode) -> io::Result<()>;

    /// Reapplies a previously captured mode.
    fn apply_mode(&mut self, mode: &Self::Mode) -> io::Result<()>;

    /// Viewport size as `(columns, rows)`.
    fn size(&self) -> io::Result<(u16, u16)> {
        crossterm::terminal::size()
    }

    /// Cursor position as 0-based `(column, row)` within the viewport.
    fn cursor_position(&self) -> io::Result<(u16, u16)> {
        crossterm::cursor::position()
    }

    /// Blocks until a key is pressed and returns it as a character.
    fn read_char(&mut self) -> io::Result<char> {
        loop {
            if let Event::Key(KeyEvent {
                code,
                kind: KeyEventKind::Press,
                ..
            }) = event::read()?
            {
                let ch = match code {
                    KeyCode::Char(c) => c,
                    KeyCode::Enter => '\n',
                    KeyCode::Tab => '\t',
                    KeyCode::Backspace => '\x7f',
                    KeyCode::Esc => '\x1b',
                    _ => continue,
                };
                return Ok(ch);
            }
        }
    }

    /// Discards input that has arrived but not been read.
    fn clear_input(&mut self) -> io::Result<()> {
        while event::poll(Duration::ZERO)? {
            event::read()?;
        }
        Ok(())
    }
}

/// Reapplies the mode held in `slot`, if any, then shows the cursor when
/// `out` is a terminal. Returns whether a mode was found.
fn restore_captured<M, W: Write>(
    slot: &Mutex<Option<M>>,
    apply: impl FnOnce(&M),
    out: &mut W,
    out_is_terminal: bool,
) -> bool {
    let Ok(slot) = slot.lock() else {
        return false;
    };
    let Some(mode) = slot.as_ref() else {
        return false;
    };
    apply(mode);
    if out_is_terminal {
        let _ = crossterm::execute!(out, crossterm::cursor::Show);
    }
    true
}

#[cfg(unix)]
pub use self::unix::{TermiosConsole as NativeConsole, emergency_restore};
#[cfg(windows)]
pub use self::windows::{ConsoleModes, WindowsConsole as NativeConsole, emergency_restore};

#[cfg(unix)]
mod unix {
    use std::io::{self, IsTerminal};
    use std::sync::Mutex;

    use nix::sys::termios::{
        self, LocalFlags, OutputFlags, SetArg, SpecialCharacterIndices, Termios,
    };

    use super::Console;

    /// First mode captured in this process, for `emergency_restore`.
    static ORIGINAL: Mutex<Option<Termios>> = Mutex::new(None);

    /// Console backed by the termios settings of stdin.
    #[derive(Debug, Default)]
    pub struct TermiosConsole;

    impl TermiosConsole {
        pub fn new() -> Self {
            Self
        }
    }

    /// `original` with echo and canonical input off, reading one byte at a
    /// time with no timeout.
    pub(super) fn quiet_termios(original: &Termios) -> Termios {
        let mut quiet = original.clone();
        quiet.local_flags.remove(LocalFlags::ECHO | LocalFlags::ICANON);
        quiet.local_flags.insert(LocalFlags::IEXTEN);
        quiet.output_flags.insert(OutputFlags::OPOST);
        quiet.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        quiet.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        quiet
    }

    impl Console for TermiosConsole {
        type Mode = Termios;

        fn capture_mode(&mut self) -> io::Result<Termios> {
            let mode = termios::tcgetattr(io::stdin()).map_err(io::Error::from)?;
            if let Ok(mut slot) = ORIGINAL.lock() {
                slot.get_or_insert_with(|| mode.clone());
            }
            Ok(mode)
        }

        fn apply_quiet_mode(&mut self, original: &Termios) -> io::Result<()> {
            let quiet = quiet_termios(original);
            termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &quiet).map_err(io::Error::from)
        }

        fn apply_mode(&mut self, mode: &Termios) -> io::Result<()> {
            termios::tcsetattr(io::stdin(), SetArg::TCSANOW, mode).map_err(io::Error::from)
        }
    }

    /// Restores the first captured mode without access to a `Terminal`.
    ///
    /// Meant for panic hooks and signal handlers. Does nothing if no mode was
    /// ever captured.
    pub fn emergency_restore() {
        let mut out = io::stdout();
        let is_terminal = out.is_terminal();
        let apply = |mode: &Termios| {
            let _ = termios::tcsetattr(io::stdin(), SetArg::TCSANOW, mode);
        };
        super::restore_captured(&ORIGINAL, apply, &mut out, is_terminal);
    }

    #[cfg(test)]
    mod tests {
        use nix::pty::openpty;
        use nix::sys::termios::{self, LocalFlags, OutputFlags, SpecialCharacterIndices};

        use super::quiet_termios;

        #[test]
        fn test_quiet_termios_flags() {
            let pty = openpty(None, None).unwrap();
            let mut original = termios::tcgetattr(&pty.slave).unwrap();
            original.local_flags.insert(LocalFlags::ECHO | LocalFlags::ICANON | LocalFlags::ISIG);
            original.local_flags.remove(LocalFlags::IEXTEN);
            original.output_flags.remove(OutputFlags::OPOST);
            original.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
            original.control_chars[SpecialCharacterIndices::VTIME as usize] = 5;

            let quiet = quiet_termios(&original);
            assert!(!quiet.local_flags.contains(LocalFlags::ECHO));
            assert!(!quiet.local_flags.contains(LocalFlags::ICANON));
            assert!(quiet.local_flags.contains(LocalFlags::IEXTEN));
            assert!(quiet.local_flags.contains(LocalFlags::ISIG));
            assert!(quiet.output_flags.contains(OutputFlags::OPOST));
            assert_eq!(quiet.control_chars[SpecialCharacterIndices::VMIN as usize], 1);
            assert_eq!(quiet.control_chars[SpecialCharacterIndices::VTIME as usize], 0);
            assert_eq!(quiet.input_flags, original.input_flags);
            assert_eq!(quiet.control_flags, original.control_flags);

            // The captured mode is left as it was.
            assert!(original.local_flags.contains(LocalFlags::ECHO | LocalFlags::ICANON));
            assert_eq!(original.control_chars[SpecialCharacterIndices::VTIME as usize], 5);
        }
    }
}

#[cfg(windows)]
#[allow(unsafe_code)]
mod windows {
    use std::io::{self, IsTerminal};
    use std::sync::Mutex;

    use windows_sys::Win32::Foundation::{HANDLE, INVALID_HANDLE_VALUE};
    use windows_sys::Win32::System::Console::{
        CONSOLE_MODE, ENABLE_ECHO_INPUT, ENABLE_EXTENDED_FLAGS, ENABLE_LINE_INPUT,
        ENABLE_PROCESSED_OUTPUT, GetConsoleMode, GetStdHandle, STD_HANDLE, STD_INPUT_HANDLE,
        STD_OUTPUT_HANDLE, SetConsoleMode,
    };

    use super::Console;

    /// First modes captured in this process, for `emergency_restore`.
    static ORIGINAL: Mutex<Option<ConsoleModes>> = Mutex::new(None);

    /// Input and output mode words of the process console.
    ///
    /// `output` is `None` when stdout is not a console.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConsoleModes {
        pub input: CONSOLE_MODE,
        pub output: Option<CONSOLE_MODE>,
    }

    /// Console backed by the mode words of the standard handles.
    #[derive(Debug, Default)]
    pub struct WindowsConsole;

    impl WindowsConsole {
        pub fn new() -> Self {
            Self
        }
    }

    /// `original` with echo and line input off. Processed input stays on so
    /// Ctrl+C still interrupts.
    pub(super) fn quiet_modes(original: &ConsoleModes) -> ConsoleModes {
        ConsoleModes {
            input: (original.input & !(ENABLE_ECHO_INPUT | ENABLE_LINE_INPUT))
                | ENABLE_EXTENDED_FLAGS,
            output: original.output.map(|mode| mode | ENABLE_PROCESSED_OUTPUT),
        }
    }

    fn std_handle(which: STD_HANDLE) -> io::Result<HANDLE> {
        // SAFETY: GetStdHandle takes no pointers.
        let handle = unsafe { GetStdHandle(which) };
        if handle == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error());
        }
        if handle.is_null() {
            return Err(io::Error::other("no console handle"));
        }
        Ok(handle)
    }

    fn get_mode(which: STD_HANDLE) -> io::Result<CONSOLE_MODE> {
        let handle = std_handle(which)?;
        let mut mode: CONSOLE_MODE = 0;
        // SAFETY: `mode` is a valid out pointer for the duration of the call.
        if unsafe { GetConsoleMode(handle, &mut mode) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(mode)
    }

    fn set_mode(which: STD_HANDLE, mode: CONSOLE_MODE) -> io::Result<()> {
        let handle = std_handle(which)?;
        // SAFETY: SetConsoleMode takes the mode by value.
        if unsafe { SetConsoleMode(handle, mode) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn set_modes(modes: &ConsoleModes) -> io::Result<()> {
        set_mode(STD_INPUT_HANDLE, modes.input)?;
        if let Some(output) = modes.output {
            set_mode(STD_OUTPUT_HANDLE, output)?;
        }
        Ok(())
    }

    impl Console for WindowsConsole {
        type Mode = ConsoleModes;

        fn capture_mode(&mut self) -> io::Result<ConsoleModes> {
            let modes = ConsoleModes {
                input: get_mode(STD_INPUT_HANDLE)?,
                output: get_mode(STD_OUTPUT_HANDLE).ok(),
            };
            if let Ok(mut slot) = ORIGINAL.lock() {
                slot.get_or_insert(modes);
            }
            Ok(modes)
        }

        fn apply_quiet_mode(&mut self, original: &ConsoleModes) -> io::Result<()> {
            set_modes(&quiet_modes(original))
        }

        fn apply_mode(&mut self, mode: &ConsoleModes) -> io::Result<()> {
            set_modes(mode)
        }
    }

    /// Restores the first captured modes without access to a `Terminal`.
    pub fn emergency_restore() {
        let mut out = io::stdout();
        let is_terminal = out.is_terminal();
        let apply = |modes: &ConsoleModes| {
            let _ = set_modes(modes);
        };
        super::restore_captured(&ORIGINAL, apply, &mut out, is_terminal);
    }

    #[cfg(test)]
    mod tests {
        use windows_sys::Win32::System::Console::ENABLE_PROCESSED_INPUT;

        use super::*;

        #[test]
        fn test_quiet_modes_flags() {
            let original = ConsoleModes {
                input: ENABLE_ECHO_INPUT | ENABLE_LINE_INPUT | ENABLE_PROCESSED_INPUT,
                output: Some(0),
            };
            let quiet = quiet_modes(&original);
            assert_eq!(quiet.input, ENABLE_PROCESSED_INPUT | ENABLE_EXTENDED_FLAGS);
            assert_eq!(quiet.output, Some(ENABLE_PROCESSED_OUTPUT));

            let redirected = ConsoleModes {
                output: None,
                ..original
            };
            assert_eq!(quiet_modes(&redirected).output, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::Mutex;

    use crossterm::Command;
    use crossterm::cursor::Show;

    use super::restore_captured;

    fn show() -> Vec<u8> {
        let mut s = String::new();
        Show.write_ansi(&mut s).unwrap();
        s.into_bytes()
    }

    #[test]
    fn test_restore_without_capture_writes_nothing() {
        let slot: Mutex<Option<u32>> = Mutex::new(None);
        let applied = Cell::new(false);
        let mut out = Vec::new();
        assert!(!restore_captured(&slot, |_| applied.set(true), &mut out, true));
        assert!(!applied.get());
        assert!(out.is_empty());
    }

    #[test]
    fn test_restore_to_pipe_skips_cursor() {
        let slot = Mutex::new(Some(7u32));
        let applied = Cell::new(None);
        let mut out = Vec::new();
        assert!(restore_captured(&slot, |m| applied.set(Some(*m)), &mut out, false));
        assert_eq!(applied.get(), Some(7));
        assert!(out.is_empty());
    }

    #[test]
    fn test_restore_to_terminal_shows_cursor() {
        let slot = Mutex::new(Some(7u32));
        let mut out = Vec::new();
        assert!(restore_captured(&slot, |_| {}, &mut out, true));
        assert_eq!(out, show());
    }
}
