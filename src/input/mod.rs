//! Push-to-talk input handling.

pub mod hotkey;

pub use hotkey::TerminalHotkey;
