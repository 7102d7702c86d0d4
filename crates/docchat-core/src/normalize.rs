//! Cleanup of raw extracted text before chunking.
//!
//! Extractors hand back text with layout whitespace, stray control
//! characters, and the occasional mis-decoded byte sequence (UTF-8 read as
//! Windows-1252, for instance). [`normalize`] flattens all of that into a
//! single line of plain text:
//!
//! 1. Replace known mojibake sequences with their intended characters.
//! 2. Map typographic punctuation and the replacement character to ASCII.
//! 3. Drop control and zero-width characters.
//! 4. Collapse whitespace runs to one space and trim the ends.

/// UTF-8 punctuation decoded as Windows-1252, and what it should have been.
const MOJIBAKE: &[(&str, &str)] = &[
    ("\u{e2}\u{20ac}\u{2122}", "'"),
    ("\u{e2}\u{20ac}\u{2dc}", "'"),
    ("\u{e2}\u{20ac}\u{153}", "\""),
    ("\u{e2}\u{20ac}\u{9d}", "\""),
    ("\u{e2}\u{20ac}\u{201c}", "-"),
    ("\u{e2}\u{20ac}\u{201d}", "-"),
    ("\u{e2}\u{20ac}\u{a6}", "..."),
    ("\u{e2}\u{20ac}\u{a2}", "*"),
    ("\u{c3}\u{a9}", "\u{e9}"),
    ("\u{c3}\u{a8}", "\u{e8}"),
    ("\u{c3}\u{a0}", "\u{e0}"),
    ("\u{c3}\u{b6}", "\u{f6}"),
    ("\u{c3}\u{bc}", "\u{fc}"),
    ("\u{c3}\u{a4}", "\u{e4}"),
    ("\u{c2}\u{a0}", " "),
];

/// Normalize raw extracted text. Never fails.
pub fn normalize(raw: &str) -> String {
    let mut repaired = raw.to_string();
    for (broken, fixed) in MOJIBAKE {
        if repaired.contains(broken) {
            repaired = repaired.replace(broken, fixed);
        }
    }

    let mut out = String::with_capacity(repaired.len());
    let mut pending_space = false;
    for c in repaired.chars() {
        let mapped: Option<&str> = match c {
            '\u{2018}' | '\u{2019}' | '\u{201a}' | '\u{2032}' => Some("'"),
            '\u{201c}' | '\u{201d}' | '\u{201e}' | '\u{2033}' => Some("\""),
            '\u{2013}' | '\u{2014}' | '\u{2212}' => Some("-"),
            '\u{2026}' => Some("..."),
            '\u{2022}' => Some("*"),
            // replacement character and non-breaking spaces read as separators
            '\u{fffd}' | '\u{a0}' | '\u{2007}' | '\u{202f}' => Some(" "),
            '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{2060}' | '\u{feff}' | '\u{ad}' => Some(""),
            _ => None,
        };

        match mapped {
            Some(" ") => pending_space = true,
            Some(s) => push_token(&mut out, s, &mut pending_space),
            None if c.is_whitespace() => pending_space = true,
            None if c.is_control() => {}
            None => {
                let mut buf = [0u8; 4];
                push_token(&mut out, c.encode_utf8(&mut buf), &mut pending_space);
            }
        }
    }

    out
}

fn push_token(out: &mut String, s: &str, pending_space: &mut bool) {
    if s.is_empty() {
        return;
    }
    if *pending_space && !out.is_empty() {
        out.push(' ');
    }
    *pending_space = false;
    out.push_str(s);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(
            normalize("  Hello\n\n\tworld   again \r\n"),
            "Hello world again"
        );
    }

    #[test]
    fn test_strips_control_characters() {
        assert_eq!(normalize("a\u{0}b\u{7}c"), "abc");
    }

    #[test]
    fn test_repairs_mojibake() {
        assert_eq!(normalize("It\u{e2}\u{20ac}\u{2122}s fine"), "It's fine");
        assert_eq!(normalize("caf\u{c3}\u{a9}"), "caf\u{e9}");
    }

    #[test]
    fn test_maps_typographic_punctuation() {
        assert_eq!(
            normalize("\u{201c}quoted\u{201d} \u{2014} it\u{2019}s\u{2026}"),
            "\"quoted\" - it's..."
        );
    }

    #[test]
    fn test_replacement_character_becomes_separator() {
        assert_eq!(normalize("bad\u{fffd}bytes"), "bad bytes");
        assert_eq!(normalize("zero\u{200b}width"), "zerowidth");
    }

    #[test]
    fn test_empty_and_blank() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n\t "), "");
    }

    #[test]
    fn test_idempotent() {
        let once = normalize("One.\n\nTwo\u{2019}s  line.\u{fffd}");
        assert_eq!(normalize(&once), once);
    }
}
