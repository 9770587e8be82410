//! Keyboard decode for the focused terminal.
//!
//! Raw host key events are translated into [`InputSymbol`]s. Anything the
//! table does not understand stays undecoded so the host can hand it to its
//! own hotkey listeners.

mod decode;

pub use decode::{InputSymbol, TerminalKey, decode_key};
