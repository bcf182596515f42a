//! Symbolic key tokens for `send_keys`.
//!
//! A key sequence is whitespace-separated tokens. Named keys, `C-x` / `M-x`
//! chords, and single printable characters are accepted; everything else is
//! rejected before it reaches a backend.

use super::errors::TerminalError;

/// One parsed key token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Enter,
    Tab,
    Escape,
    Space,
    Backspace,
    Up,
    Down,
    Left,
    Right,
    /// `C-x`: Control chord with a lowercase ASCII letter.
    Ctrl(char),
    /// `M-x`: Meta/Alt chord.
    Meta(char),
    /// A single printable character.
    Char(char),
}

impl Key {
    /// Parse one token.
    pub fn parse(token: &str) -> Result<Self, TerminalError> {
        match token {
            "Enter" => return Ok(Key::Enter),
            "Tab" => return Ok(Key::Tab),
            "Esc" | "Escape" => return Ok(Key::Escape),
            "Space" => return Ok(Key::Space),
            "BSpace" | "Backspace" => return Ok(Key::Backspace),
            "Up" => return Ok(Key::Up),
            "Down" => return Ok(Key::Down),
            "Left" => return Ok(Key::Left),
            "Right" => return Ok(Key::Right),
            _ => {}
        }

        let mut chars = token.chars();
        match (chars.next(), chars.next(), chars.next(), chars.next()) {
            (Some(c), None, _, _) if !c.is_control() => Ok(Key::Char(c)),
            (Some('C'), Some('-'), Some(c), None) if c.is_ascii_alphabetic() => {
                Ok(Key::Ctrl(c.to_ascii_lowercase()))
            }
            (Some('M'), Some('-'), Some(c), None) if !c.is_control() => Ok(Key::Meta(c)),
            _ => Err(TerminalError::InvalidKey {
                token: token.to_string(),
            }),
        }
    }

    /// The raw bytes this key produces on a terminal, for backends that can
    /// only write bytes (WezTerm `send-text --no-paste`).
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Key::Enter => vec![b'\r'],
            Key::Tab => vec![b'\t'],
            Key::Escape => vec![0x1b],
            Key::Space => vec![b' '],
            Key::Backspace => vec![0x7f],
            Key::Up => b"\x1b[A".to_vec(),
            Key::Down => b"\x1b[B".to_vec(),
            Key::Right => b"\x1b[C".to_vec(),
            Key::Left => b"\x1b[D".to_vec(),
            Key::Ctrl(c) => vec![(c.to_ascii_uppercase() as u8) & 0x1f],
            Key::Meta(c) => {
                let mut bytes = vec![0x1b];
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                bytes
            }
            Key::Char(c) => {
                let mut buf = [0u8; 4];
                c.encode_utf8(&mut buf).as_bytes().to_vec()
            }
        }
    }

    /// The tmux `send-keys` spelling of this key.
    pub fn tmux_token(&self) -> String {
        match self {
            Key::Enter => "Enter".to_string(),
            Key::Tab => "Tab".to_string(),
            Key::Escape => "Escape".to_string(),
            Key::Space => "Space".to_string(),
            Key::Backspace => "BSpace".to_string(),
            Key::Up => "Up".to_string(),
            Key::Down => "Down".to_string(),
            Key::Left => "Left".to_string(),
            Key::Right => "Right".to_string(),
            Key::Ctrl(c) => format!("C-{c}"),
            Key::Meta(c) => format!("M-{c}"),
            Key::Char(c) => c.to_string(),
        }
    }
}

/// Parse a whitespace-separated key sequence.
pub fn parse_sequence(keys: &str) -> Result<Vec<Key>, TerminalError> {
    keys.split_whitespace().map(Key::parse).collect()
}
