use std::sync::{Arc, Mutex};

use crate::identity::PartId;
use crate::input::TerminalKey;
use crate::script::BindingTable;

/// Point-in-time copy of a processor's terminal screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenSnapshot {
    pub rows: Vec<String>,
    pub row_count: usize,
    pub column_count: usize,
    pub cursor_row: usize,
    pub cursor_column: usize,
}

/// Capability the scripting computer exposes for one processor part.
///
/// This is the public accessor surface the cockpit needs: power, keyboard
/// injection, a screen snapshot, and the getter/setter table scripts read
/// signals through.
///
/// Keystrokes arrive with the registry unlocked, so `type_char` and
/// `special_key` may evaluate signal bindings. Every other method can be
/// called while the registry lock is held and must not evaluate them.
pub trait Processor: Send {
    fn part(&self) -> PartId;
    fn is_powered(&self) -> bool;
    fn toggle_power(&mut self);
    fn type_char(&mut self, ch: char);
    fn special_key(&mut self, key: TerminalKey);
    fn screen(&self) -> ScreenSnapshot;
    fn set_screen_size(&mut self, rows: usize, columns: usize);
    fn bindings(&mut self) -> &mut dyn BindingTable;
}

pub type SharedProcessor = Arc<Mutex<dyn Processor>>;
