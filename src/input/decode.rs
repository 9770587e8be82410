use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Editing commands understood by a processor's terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalKey {
    Break,
    StartNextLine,
    DeleteLine,
    MoveToStart,
    MoveToEnd,
    CursorLeftOne,
    CursorRightOne,
    CursorUpOne,
    CursorDownOne,
    HomeCursor,
    EndCursor,
    PageUpCursor,
    PageDownCursor,
    DeleteRight,
    DeleteLeft,
}

impl TerminalKey {
    /// Code point handed to the processor interpreter.
    pub fn code(self) -> u32 {
        match self {
            TerminalKey::MoveToStart => 0x01,
            TerminalKey::Break => 0x03,
            TerminalKey::MoveToEnd => 0x05,
            TerminalKey::DeleteLeft => 0x08,
            TerminalKey::StartNextLine => 0x0A,
            TerminalKey::DeleteLine => 0x0D,
            TerminalKey::CursorUpOne => 0xE000,
            TerminalKey::CursorDownOne => 0xE001,
            TerminalKey::CursorLeftOne => 0xE002,
            TerminalKey::CursorRightOne => 0xE003,
            TerminalKey::HomeCursor => 0xE004,
            TerminalKey::EndCursor => 0xE005,
            TerminalKey::PageUpCursor => 0xE006,
            TerminalKey::PageDownCursor => 0xE007,
            TerminalKey::DeleteRight => 0xE008,
        }
    }
}

/// One logical input delivered to the focused monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSymbol {
    Char(char),
    Key(TerminalKey),
}

/// Decode one raw key event. `None` means the event must not be consumed.
///
/// Enter is matched before anything else; control chords come next and take
/// priority over the printable range so Ctrl+C never types a `c`. Editing and
/// navigation keys decode whatever the modifiers.
pub fn decode_key(event: &KeyEvent) -> Option<InputSymbol> {
    if event.kind == KeyEventKind::Release {
        return None;
    }

    if event.code == KeyCode::Enter {
        return Some(InputSymbol::Key(TerminalKey::StartNextLine));
    }

    if let KeyCode::Char(ch) = event.code {
        if event.modifiers.contains(KeyModifiers::CONTROL) {
            return control_chord(ch).map(InputSymbol::Key);
        }
    }

    match event.code {
        KeyCode::Char(ch) if is_printable_ascii(ch) => Some(InputSymbol::Char(ch)),
        KeyCode::Tab => Some(InputSymbol::Char('\t')),
        KeyCode::Left => Some(InputSymbol::Key(TerminalKey::CursorLeftOne)),
        KeyCode::Right => Some(InputSymbol::Key(TerminalKey::CursorRightOne)),
        KeyCode::Up => Some(InputSymbol::Key(TerminalKey::CursorUpOne)),
        KeyCode::Down => Some(InputSymbol::Key(TerminalKey::CursorDownOne)),
        KeyCode::Home => Some(InputSymbol::Key(TerminalKey::HomeCursor)),
        KeyCode::End => Some(InputSymbol::Key(TerminalKey::EndCursor)),
        KeyCode::PageUp => Some(InputSymbol::Key(TerminalKey::PageUpCursor)),
        KeyCode::PageDown => Some(InputSymbol::Key(TerminalKey::PageDownCursor)),
        KeyCode::Delete => Some(InputSymbol::Key(TerminalKey::DeleteRight)),
        KeyCode::Backspace => Some(InputSymbol::Key(TerminalKey::DeleteLeft)),
        _ => None,
    }
}

fn control_chord(ch: char) -> Option<TerminalKey> {
    match ch.to_ascii_lowercase() {
        'c' => Some(TerminalKey::Break),
        'x' | 'd' => Some(TerminalKey::DeleteLine),
        'a' => Some(TerminalKey::MoveToStart),
        'e' => Some(TerminalKey::MoveToEnd),
        _ => None,
    }
}

fn is_printable_ascii(ch: char) -> bool {
    ('\u{20}'..='\u{7e}').contains(&ch)
}
