//! Human-readable rendering of client keystrokes.
//!
//! Keystrokes are shown in a plain text log next to the terminal, so control
//! bytes have to be spelled out. Known escape sequences are matched first, in
//! table order, at every position of the input; whatever control bytes remain
//! (other than tab and newline) are written as `[\<code>]`.

/// Escape sequences with a display label, matched in order.
///
/// Longer sequences must come before their prefixes; the bare ESC entry is
/// last among the ESC-introduced ones.
pub const KEY_LABELS: &[(&str, &str)] = &[
    ("\x1b[A", "[UP]"),
    ("\x1b[B", "[DOWN]"),
    ("\x1b[C", "[RIGHT]"),
    ("\x1b[D", "[LEFT]"),
    ("\x1bOA", "[UP]"),
    ("\x1bOB", "[DOWN]"),
    ("\x1bOC", "[RIGHT]"),
    ("\x1bOD", "[LEFT]"),
    ("\x1b[H", "[HOME]"),
    ("\x1b[F", "[END]"),
    ("\x1bOH", "[HOME]"),
    ("\x1bOF", "[END]"),
    ("\x1b[1~", "[HOME]"),
    ("\x1b[2~", "[INSERT]"),
    ("\x1b[3~", "[DELETE]"),
    ("\x1b[4~", "[END]"),
    ("\x1b[5~", "[PGUP]"),
    ("\x1b[6~", "[PGDN]"),
    ("\x1bOP", "[F1]"),
    ("\x1bOQ", "[F2]"),
    ("\x1bOR", "[F3]"),
    ("\x1bOS", "[F4]"),
    ("\x1b[15~", "[F5]"),
    ("\x1b[17~", "[F6]"),
    ("\x1b[18~", "[F7]"),
    ("\x1b[19~", "[F8]"),
    ("\x1b[20~", "[F9]"),
    ("\x1b[21~", "[F10]"),
    ("\x1b[23~", "[F11]"),
    ("\x1b[24~", "[F12]"),
    ("\x1b", "[ESC]"),
    ("\x7f", "[BACKSPACE]"),
];

/// Escape raw keystroke bytes for the keystroke log.
#[must_use]
pub fn escape_keystrokes(data: &[u8]) -> String {
    escape_str(&String::from_utf8_lossy(data))
}

/// Escape keystroke text for the keystroke log.
#[must_use]
pub fn escape_str(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    'outer: while let Some(c) = rest.chars().next() {
        for (pattern, label) in KEY_LABELS {
            if let Some(tail) = rest.strip_prefix(pattern) {
                out.push_str(label);
                rest = tail;
                continue 'outer;
            }
        }

        if (c as u32) < 0x20 && c != '\t' && c != '\n' {
            out.push_str(&format!("[\\{}]", c as u32));
        } else {
            out.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }

    out
}
