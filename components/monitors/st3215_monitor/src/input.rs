//! Keyboard handling while the table is on screen.

use crate::session::CancelToken;
use log::warn;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often the key thread checks whether polling has stopped.
const KEY_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Save,
    Quit,
}

pub fn action_for(key: &KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Enter => Some(Action::Save),
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        _ => None,
    }
}

/// Turns key presses into save requests and cancellation until `cancel` is set.
pub fn spawn_key_reader(cancel: CancelToken, save: Sender<()>) -> JoinHandle<()> {
    thread::spawn(move || {
        while !cancel.is_cancelled() {
            match event::poll(KEY_POLL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    warn!("cannot poll keyboard: {e}");
                    break;
                }
            }
            let key = match event::read() {
                Ok(Event::Key(key)) => key,
                Ok(_) => continue,
                Err(e) => {
                    warn!("cannot read keyboard: {e}");
                    break;
                }
            };
            match action_for(&key) {
                Some(Action::Save) => {
                    if save.send(()).is_err() {
                        break;
                    }
                }
                Some(Action::Quit) => cancel.cancel(),
                None => {}
            }
        }
    })
}
