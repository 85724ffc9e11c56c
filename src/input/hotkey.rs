//! Terminal push-to-talk hotkey listener.
//!
//! Reads raw-mode key events on a dedicated thread and maps them to
//! `HotkeyEvent`s. Where the terminal reports key releases (kitty
//! keyboard protocol) hold-to-talk works press/release; otherwise the
//! hotkey toggles: first press activates, second press deactivates.
//! Esc or Ctrl+C closes the session.

use anyhow::{Context, Result};
use async_trait::async_trait;
use crossterm::event::{
    Event, KeyCode, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::execute;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::adapters::{HotkeyEvent, HotkeySource};

/// Hotkey listener for interactive terminal sessions.
///
/// Each push-to-talk session runs its own listener thread; the thread
/// exits once the session deactivates or closes.
pub struct TerminalHotkey {
    key: KeyCode,
    rx: Option<mpsc::UnboundedReceiver<HotkeyEvent>>,
}

impl TerminalHotkey {
    pub fn new(hotkey: &str) -> Result<Self> {
        Ok(Self {
            key: parse_hotkey(hotkey)?,
            rx: None,
        })
    }
}

#[async_trait]
impl HotkeySource for TerminalHotkey {
    async fn next_event(&mut self) -> Result<HotkeyEvent> {
        if self.rx.is_none() {
            self.rx = Some(spawn_session(self.key));
        }
        let event = match self.rx.as_mut().expect("receiver just set").recv().await {
            Some(event) => event,
            None => HotkeyEvent::Closed,
        };
        // Deactivation or closure ends the listener thread; the next
        // session spawns a fresh one.
        if matches!(event, HotkeyEvent::Deactivated | HotkeyEvent::Closed) {
            self.rx = None;
        }
        Ok(event)
    }
}

fn spawn_session(key: KeyCode) -> mpsc::UnboundedReceiver<HotkeyEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        if let Err(e) = run_session(key, &tx) {
            warn!(error = %e, "hotkey listener failed");
            let _ = tx.send(HotkeyEvent::Closed);
        }
    });
    rx
}

fn run_session(key: KeyCode, tx: &mpsc::UnboundedSender<HotkeyEvent>) -> Result<()> {
    enable_raw_mode().context("failed to enable raw terminal mode")?;
    let release_events = crossterm::terminal::supports_keyboard_enhancement().unwrap_or(false);
    if release_events {
        let _ = execute!(
            std::io::stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );
    }

    debug!(?key, release_events, "hotkey session armed");
    let result = session_loop(key, release_events, tx);

    if release_events {
        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
    }
    let _ = disable_raw_mode();
    result
}

fn session_loop(
    key: KeyCode,
    release_events: bool,
    tx: &mpsc::UnboundedSender<HotkeyEvent>,
) -> Result<()> {
    let mut active = false;
    loop {
        let event = crossterm::event::read().context("failed to read terminal event")?;
        let Event::Key(key_event) = event else {
            continue;
        };

        let is_interrupt = key_event.code == KeyCode::Esc
            || (key_event.code == KeyCode::Char('c')
                && key_event.modifiers.contains(KeyModifiers::CONTROL));
        if is_interrupt && key_event.kind == KeyEventKind::Press {
            let _ = tx.send(HotkeyEvent::Closed);
            return Ok(());
        }
        if key_event.code != key {
            continue;
        }

        match key_event.kind {
            KeyEventKind::Press if !active => {
                active = true;
                let _ = tx.send(HotkeyEvent::Activated);
                // Without release reporting the next press deactivates.
            }
            KeyEventKind::Press if !release_events => {
                let _ = tx.send(HotkeyEvent::Deactivated);
                return Ok(());
            }
            KeyEventKind::Release if active => {
                let _ = tx.send(HotkeyEvent::Deactivated);
                return Ok(());
            }
            _ => {}
        }
    }
}

/// Map a configured hotkey name to a crossterm key code.
fn parse_hotkey(name: &str) -> Result<KeyCode> {
    let lowered = name.trim().to_lowercase();
    let code = match lowered.as_str() {
        "space" | " " => KeyCode::Char(' '),
        "enter" | "return" => KeyCode::Enter,
        "tab" => KeyCode::Tab,
        other if other.len() == 1 => KeyCode::Char(other.chars().next().unwrap()),
        other if other.starts_with('f') => {
            let n: u8 = other[1..]
                .parse()
                .with_context(|| format!("unsupported hotkey '{}'", name))?;
            KeyCode::F(n)
        }
        _ => anyhow::bail!("unsupported hotkey '{}'", name),
    };
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_named_keys() {
        assert_eq!(parse_hotkey("space").unwrap(), KeyCode::Char(' '));
        assert_eq!(parse_hotkey("Enter").unwrap(), KeyCode::Enter);
        assert_eq!(parse_hotkey("f8").unwrap(), KeyCode::F(8));
        assert_eq!(parse_hotkey("x").unwrap(), KeyCode::Char('x'));
    }

    #[test]
    fn parse_rejects_unknown_names() {
        assert!(parse_hotkey("hyperspace").is_err());
        assert!(parse_hotkey("fx").is_err());
    }
}
