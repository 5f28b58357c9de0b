use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use tui_textarea::{Input, Key};

/// Source of terminal events, so the main loop can be driven by scripted
/// input in tests.
pub trait EventSource {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool>;
    fn read(&mut self) -> io::Result<Event>;
}

pub struct KeyboardEventSource;

impl EventSource for KeyboardEventSource {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        event::poll(timeout)
    }

    fn read(&mut self) -> io::Result<Event> {
        event::read()
    }
}

/// Replays a fixed list of events, then reports nothing pending.
#[derive(Default)]
pub struct SimulatedEventSource {
    events: VecDeque<Event>,
}

impl SimulatedEventSource {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events: events.into(),
        }
    }

    pub fn is_drained(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSource for SimulatedEventSource {
    fn poll(&mut self, _timeout: Duration) -> io::Result<bool> {
        Ok(!self.events.is_empty())
    }

    fn read(&mut self) -> io::Result<Event> {
        self.events
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no more events"))
    }
}

/// Tracks multi-key vim sequences such as `gg`.
pub struct KeySeq {
    keys: String,
    last_key: Instant,
}

const KEY_SEQ_TIMEOUT: Duration = Duration::from_millis(1000);

impl Default for KeySeq {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySeq {
    pub fn new() -> Self {
        Self {
            keys: String::new(),
            last_key: Instant::now(),
        }
    }

    /// Appends `key` and returns the sequence typed so far. A completed
    /// two-key sequence resets the buffer.
    pub fn handle_key(&mut self, key: char) -> String {
        if self.last_key.elapsed() > KEY_SEQ_TIMEOUT || self.keys.len() >= 2 {
            self.keys.clear();
        }
        self.last_key = Instant::now();
        self.keys.push(key);
        let current = self.keys.clone();
        if current.len() >= 2 {
            self.keys.clear();
        }
        current
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

/// Converts a crossterm key into a textarea input without relying on the
/// crossterm version tui-textarea was built against.
pub fn map_keys_to_input(key: KeyEvent) -> Option<Input> {
    let mapped = match key.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Enter => Key::Enter,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Tab => Key::Tab,
        KeyCode::Delete => Key::Delete,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Esc => Key::Esc,
        KeyCode::F(n) => Key::F(n),
        _ => return None,
    };
    Some(Input {
        key: mapped,
        ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
        alt: key.modifiers.contains(KeyModifiers::ALT),
        shift: key.modifiers.contains(KeyModifiers::SHIFT),
    })
}

/// Splits text pasted by a terminal drag-and-drop into paths.
///
/// Terminals paste dropped files as shell-quoted paths separated by
/// whitespace or newlines, sometimes as `file://` URLs.
pub fn parse_dropped_paths(text: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = text.trim().chars();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => quote = Some(ch),
            (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            (None, c) if c.is_whitespace() => {
                if !current.is_empty() {
                    paths.push(path_from_token(&current));
                    current.clear();
                }
            }
            (None, c) => current.push(c),
        }
    }
    if !current.is_empty() {
        paths.push(path_from_token(&current));
    }
    paths
}

/// Only `file://` URIs are percent-encoded; plain paths are taken literally.
fn path_from_token(token: &str) -> PathBuf {
    match token.strip_prefix("file://") {
        Some(uri_path) => PathBuf::from(percent_decode(uri_path)),
        None => PathBuf::from(token),
    }
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let value = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(value) = value {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_plain_path() {
        assert_eq!(
            parse_dropped_paths("/books/dune.epub\n"),
            vec![PathBuf::from("/books/dune.epub")]
        );
    }

    #[test]
    fn test_parse_quoted_and_escaped_paths() {
        let paths = parse_dropped_paths("'/books/war and peace.epub' /books/moby\\ dick.epub");
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/books/war and peace.epub"),
                PathBuf::from("/books/moby dick.epub"),
            ]
        );
    }

    #[test]
    fn test_parse_file_urls() {
        let paths = parse_dropped_paths("file:///books/war%20and%20peace.epub");
        assert_eq!(paths, vec![PathBuf::from("/books/war and peace.epub")]);
    }

    #[test]
    fn test_plain_paths_keep_percent_signs() {
        let paths = parse_dropped_paths("/books/100%41.epub file:///books/100%2541.epub");
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/books/100%41.epub"),
                PathBuf::from("/books/100%41.epub"),
            ]
        );
    }

    #[test]
    fn test_parse_empty_paste() {
        assert!(parse_dropped_paths("   \n").is_empty());
    }

    #[test]
    fn test_key_seq_detects_gg() {
        let mut seq = KeySeq::new();
        assert_eq!(seq.handle_key('g'), "g");
        assert_eq!(seq.handle_key('g'), "gg");
        assert_eq!(seq.handle_key('g'), "g");
    }

    #[test]
    fn test_simulated_source_drains() {
        let mut source = SimulatedEventSource::new(vec![Event::FocusGained]);
        assert!(source.poll(Duration::ZERO).unwrap());
        assert_eq!(source.read().unwrap(), Event::FocusGained);
        assert!(!source.poll(Duration::ZERO).unwrap());
        assert!(source.is_drained());
    }
}
