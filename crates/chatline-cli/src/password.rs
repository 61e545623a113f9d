//! Password entry without echo

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, IsTerminal, Write};

/// What a key press did to the password being typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Editing,
    Done,
    Interrupted,
}

fn apply_key(buffer: &mut String, key: KeyEvent) -> Entry {
    if key.kind != KeyEventKind::Press {
        return Entry::Editing;
    }
    match key.code {
        KeyCode::Enter => Entry::Done,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Entry::Interrupted,
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => Entry::Done,
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            buffer.clear();
            Entry::Editing
        }
        KeyCode::Backspace => {
            buffer.pop();
            Entry::Editing
        }
        KeyCode::Char(c) => {
            buffer.push(c);
            Entry::Editing
        }
        _ => Entry::Editing,
    }
}

/// Restores cooked mode however the read ends
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Prompt for a password. Keystrokes are not echoed when stdin is a
/// terminal; piped input is read as a plain line.
pub fn read_password(label: &str) -> io::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    if !io::stdin().is_terminal() {
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        return Ok(input.trim_end_matches(['\r', '\n']).to_string());
    }

    let mut password = String::new();
    let entry = {
        let _raw = RawMode::enable()?;
        loop {
            if let Event::Key(key) = event::read()? {
                match apply_key(&mut password, key) {
                    Entry::Editing => {}
                    done => break done,
                }
            }
        }
    };
    println!();

    match entry {
        Entry::Interrupted => Err(io::Error::new(
            io::ErrorKind::Interrupted,
            "Password entry cancelled",
        )),
        _ => Ok(password),
    }
}
