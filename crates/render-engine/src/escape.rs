//! Escaping literal text for ffmpeg filter descriptions.
//!
//! A drawtext string passes through three parsers before it is rendered,
//! so it is escaped three times, innermost first:
//!
//! 1. drawtext text expansion: `\` and `%`
//! 2. filter option values (`key=value:key=value`): `\`, `'` and `:`
//! 3. the filtergraph description itself: `\`, `'`, `[`, `]`, `,` and `;`
//!
//! Levels 2 and 3 are tokenized by `av_get_token`, which also strips
//! unescaped leading and trailing whitespace, so edge spaces are escaped
//! there as well. Strings without special characters pass through unchanged.

use vidstack_common::error::{VidstackError, VidstackResult};

const TEXT_SPECIAL: &[char] = &['\\', '%'];
const OPTION_SPECIAL: &[char] = &['\\', '\'', ':'];
const GRAPH_SPECIAL: &[char] = &['\\', '\'', '[', ']', ',', ';'];

/// Reject text drawtext cannot render as a single literal line.
pub fn validate_text(text: &str) -> VidstackResult<()> {
    if let Some(ch) = text.chars().find(|c| c.is_control()) {
        return Err(VidstackError::escape(
            text,
            format!("control character U+{:04X} is not representable", ch as u32),
        ));
    }
    Ok(())
}

/// Escape free text for a drawtext `text=` value embedded in a filtergraph.
pub fn escape_drawtext(text: &str) -> VidstackResult<String> {
    validate_text(text)?;
    let expanded = backslash_escape(text, TEXT_SPECIAL, false);
    Ok(escape_option_value(&expanded))
}

/// Escape a non-text option value (colors, font paths) for a filtergraph.
pub fn escape_option_value(value: &str) -> String {
    let option = backslash_escape(value, OPTION_SPECIAL, true);
    backslash_escape(&option, GRAPH_SPECIAL, true)
}

/// Reverse [`escape_drawtext`]: what drawtext finally renders.
pub fn unescape_drawtext(escaped: &str) -> String {
    let option = unescape_av_token(escaped);
    let expanded = unescape_av_token(&option);
    unescape_text_expansion(&expanded)
}

/// Reverse [`escape_option_value`]: what the filter receives.
pub fn unescape_option_value(escaped: &str) -> String {
    unescape_av_token(&unescape_av_token(escaped))
}

fn backslash_escape(input: &str, special: &[char], guard_edges: bool) -> String {
    let chars: Vec<char> = input.chars().collect();
    let leading = chars.iter().take_while(|c| **c == ' ').count();
    let trailing_start = chars.len() - chars.iter().rev().take_while(|c| **c == ' ').count();

    let mut escaped = String::with_capacity(input.len() + 8);
    for (idx, &ch) in chars.iter().enumerate() {
        let edge_space = guard_edges && ch == ' ' && (idx < leading || idx >= trailing_start);
        if special.contains(&ch) || edge_space {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Tokenize one value the way `av_get_token` does: `\x` yields `x`,
/// `'...'` is copied literally, and unescaped edge whitespace is dropped.
fn unescape_av_token(input: &str) -> String {
    let mut chars = input.trim_start_matches(is_av_whitespace).chars();
    let mut out = String::with_capacity(input.len());
    // Bytes of `out` that trailing-whitespace trimming must not touch.
    let mut protected = 0;

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(next) => {
                    out.push(next);
                    protected = out.len();
                }
                None => out.push('\\'),
            },
            '\'' => {
                let mut closed = false;
                for quoted in chars.by_ref() {
                    if quoted == '\'' {
                        closed = true;
                        break;
                    }
                    out.push(quoted);
                }
                if closed {
                    protected = out.len();
                }
            }
            _ => out.push(ch),
        }
    }

    while out.len() > protected && out.ends_with(is_av_whitespace) {
        out.pop();
    }
    out
}

/// drawtext's own pass: `\x` yields `x`, nothing is trimmed.
fn unescape_text_expansion(input: &str) -> String {
    let mut chars = input.chars();
    let mut out = String::with_capacity(input.len());
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(ch);
    }
    out
}

fn is_av_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\n' | '\t' | '\r')
}
