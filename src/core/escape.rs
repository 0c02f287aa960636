// Reversible cell escaping so one field never spans a tab or a line break.
use std::borrow::Cow;

const RESERVED: [char; 4] = ['\\', '\t', '\r', '\n'];

/// Escape backslash, tab, CR, and LF in a single left-to-right pass.
///
/// Returns the input unchanged (borrowed) when it holds no reserved character.
pub fn encode(value: &str) -> Cow<'_, str> {
    if !value.contains(RESERVED) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 8);
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Inverse of [`encode`]: a single scan that consumes each two-character
/// escape marker exactly once.
///
/// A backslash followed by anything other than `t`, `r`, `n` or `\` (or a
/// trailing lone backslash) is emitted as-is.
pub fn decode(value: &str) -> Cow<'_, str> {
    if !value.contains('\\') {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let replacement = match chars.peek() {
            Some('t') => '\t',
            Some('r') => '\r',
            Some('n') => '\n',
            Some('\\') => '\\',
            _ => {
                out.push('\\');
                continue;
            }
        };
        chars.next();
        out.push(replacement);
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::{decode, encode};
    use std::borrow::Cow;

    #[test]
    fn plain_text_is_borrowed() {
        assert!(matches!(encode("hello world"), Cow::Borrowed("hello world")));
        assert!(matches!(decode("hello world"), Cow::Borrowed("hello world")));
    }

    #[test]
    fn encodes_each_reserved_character() {
        assert_eq!(encode("a\tb"), "a\\tb");
        assert_eq!(encode("a\rb"), "a\\rb");
        assert_eq!(encode("a\nb"), "a\\nb");
        assert_eq!(encode("a\\b"), "a\\\\b");
        assert_eq!(encode("\r\n"), "\\r\\n");
    }

    #[test]
    fn encoded_text_has_no_raw_delimiters() {
        let encoded = encode("x\ty\r\nz\\");
        assert!(!encoded.contains(['\t', '\r', '\n']));
    }

    #[test]
    fn backslash_before_letter_is_not_an_escape_after_encoding() {
        // literal backslash + 't' must not come back as a tab
        let source = "C:\\temp\\new";
        let encoded = encode(source);
        assert_eq!(encoded, "C:\\\\temp\\\\new");
        assert_eq!(decode(&encoded), source);
    }

    #[test]
    fn backslash_runs_before_control_characters_round_trip() {
        for run in 1..=5 {
            for control in ['\t', '\r', '\n'] {
                let source = format!("{}{}x", "\\".repeat(run), control);
                assert_eq!(decode(&encode(&source)), source, "run={run}");
                let source = format!("{}{}t", control, "\\".repeat(run));
                assert_eq!(decode(&encode(&source)), source, "run={run}");
            }
        }
    }

    #[test]
    fn unknown_escape_and_trailing_backslash_pass_through() {
        assert_eq!(decode("a\\qb"), "a\\qb");
        assert_eq!(decode("end\\"), "end\\");
    }

    #[test]
    fn multibyte_text_round_trips() {
        let source = "検索\t物\\n";
        assert_eq!(decode(&encode(source)), source);
    }
}
