use super::{InputEvent, Key};
use crossbeam_channel::Sender;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Puts the terminal in raw mode and forwards key presses as input events.
/// Raw mode is left again on drop.
pub struct KeyboardReader {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl KeyboardReader {
    pub fn start(sender: Sender<InputEvent>) -> std::io::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();

        let thread_handle = std::thread::spawn(move || {
            while thread_running.load(Ordering::Relaxed) {
                match event::poll(POLL_INTERVAL) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(e) => {
                        log::error!("Failed to poll terminal: {}", e);
                        return;
                    }
                }

                let translated = match event::read() {
                    Ok(Event::Key(key)) => translate_key(&key),
                    Ok(_) => None,
                    Err(e) => {
                        log::error!("Failed to read terminal event: {}", e);
                        return;
                    }
                };

                if let Some(input) = translated {
                    if sender.send(input).is_err() {
                        return;
                    }
                }
            }
        });

        Ok(Self {
            running,
            thread_handle: Some(thread_handle),
        })
    }
}

impl Drop for KeyboardReader {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        if let Err(e) = crossterm::terminal::disable_raw_mode() {
            log::error!("Failed to restore terminal: {}", e);
        }
    }
}

/// Raw mode swallows Ctrl+C, so it is turned into a quit request here
fn translate_key(key: &KeyEvent) -> Option<InputEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    let key = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return Some(InputEvent::Quit)
        }
        KeyCode::Esc => Key::Escape,
        _ => Key::Other,
    };

    Some(InputEvent::KeyPress { key })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode, modifiers: KeyModifiers, kind: KeyEventKind) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn escape_becomes_escape_key() {
        let ev = translate_key(&key(KeyCode::Esc, KeyModifiers::NONE, KeyEventKind::Press));
        assert_eq!(ev, Some(InputEvent::KeyPress { key: Key::Escape }));
    }

    #[test]
    fn ctrl_c_is_a_quit_request() {
        let ev = translate_key(&key(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL,
            KeyEventKind::Press,
        ));
        assert_eq!(ev, Some(InputEvent::Quit));
    }

    #[test]
    fn releases_are_ignored() {
        let ev = translate_key(&key(KeyCode::Esc, KeyModifiers::NONE, KeyEventKind::Release));
        assert_eq!(ev, None);
    }

    #[test]
    fn other_keys_pass_through() {
        let ev = translate_key(&key(KeyCode::Char('c'), KeyModifiers::NONE, KeyEventKind::Press));
        assert_eq!(ev, Some(InputEvent::KeyPress { key: Key::Other }));
        let ev = translate_key(&key(KeyCode::Tab, KeyModifiers::NONE, KeyEventKind::Press));
        assert_eq!(ev, Some(InputEvent::KeyPress { key: Key::Other }));
    }
}
