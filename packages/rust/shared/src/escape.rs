//! Backslash escaping for literal text placed into Markdown.
//!
//! The parser escapes characters that carry inline meaning as it reads DOM
//! text. Line-leading constructs depend on where a line ends up, so the
//! serializer escapes those with [`escape_line_start`].

/// Characters with inline Markdown meaning anywhere in a line.
const INLINE_SPECIAL: &[char] = &['\\', '*', '_', '`', '[', ']', '<', '~'];

/// Escape `text` so it renders literally inside a paragraph.
///
/// `&` is escaped only where it would start a character reference.
pub fn escape_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, ch) in text.char_indices() {
        if INLINE_SPECIAL.contains(&ch) || (ch == '&' && starts_entity(&text[i + 1..])) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Whether `rest` (the text after an `&`) reads as `name;` or `#123;`.
fn starts_entity(rest: &str) -> bool {
    let name_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'#')
        .count();
    name_len > 0 && rest[name_len..].starts_with(';')
}

/// Escape a leading character that would make `line` a heading, list item,
/// block quote, or setext underline.
pub fn escape_line_start(line: &str) -> String {
    let rest = line.trim_start();
    let indent = &line[..line.len() - rest.len()];

    if rest.starts_with(['#', '-', '+', '>', '=']) {
        return format!("{indent}\\{rest}");
    }

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if (1..=9).contains(&digits) && rest[digits..].starts_with(['.', ')']) {
        let (number, tail) = rest.split_at(digits);
        return format!("{indent}{number}\\{tail}");
    }

    line.to_string()
}

/// Drop backslash escapes, recovering the literal text.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next_if(char::is_ascii_punctuation) {
                out.push(next);
                continue;
            }
        }
        out.push(ch);
    }
    out
}
