//! ANSI color table exposed to programs through the capability context.
//!
//! Rendering escape sequences into styled output belongs to the terminal
//! layer; this module only produces the sequences.

/// The colors a program may paint output with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Color {
    /// SGR foreground code.
    pub fn code(self) -> u8 {
        match self {
            Color::Black => 30,
            Color::Red => 31,
            Color::Green => 32,
            Color::Yellow => 33,
            Color::Blue => 34,
            Color::Magenta => 35,
            Color::Cyan => 36,
            Color::White => 37,
        }
    }
}

/// Wrap `text` in the SGR sequence for `color`, resetting afterwards.
pub fn paint(color: Color, text: &str) -> String {
    format!("\x1b[{}m{}\x1b[0m", color.code(), text)
}

/// Whether `text` already carries an escape sequence.
pub fn has_escape(text: &str) -> bool {
    text.contains('\x1b')
}
