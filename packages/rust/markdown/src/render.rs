//! Per-block Markdown rendering.

use htmlcmd_shared::{ContentBlock, ListItem, escape_line_start};

/// Render one block. The result carries no trailing newline.
pub(crate) fn block(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Text { text } => text
            .trim_end()
            .lines()
            .map(escape_line_start)
            .collect::<Vec<_>>()
            .join("\n"),
        ContentBlock::Heading { level, text } => {
            let hashes = "#".repeat(usize::from((*level).clamp(1, 6)));
            format!("{hashes} {}", heading_text(&one_line(text)))
        }
        ContentBlock::List { ordered, items } => list(*ordered, items),
        ContentBlock::Code { language, code } => code_block(language.as_deref(), code),
        ContentBlock::Table { rows } => table(rows),
        ContentBlock::Image {
            src,
            alt,
            local_path,
        } => {
            let target = local_path.as_deref().unwrap_or(src);
            format!("![{}]({})", escape_label(&one_line(alt)), link_target(target))
        }
        ContentBlock::Link { href, text } => {
            let text = one_line(text);
            let label = if text.is_empty() { href.as_str() } else { &text };
            format!("[{}]({})", escape_label(label), link_target(href))
        }
        ContentBlock::Quote { blocks } => quote(blocks),
        ContentBlock::Markdown { content } => content.trim_end_matches('\n').to_string(),
    }
}

/// Collapse `text` onto one trimmed line.
pub(crate) fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape a trailing run of `#` that would read as a closing sequence.
pub(crate) fn heading_text(text: &str) -> String {
    let stripped = text.trim_end_matches('#');
    if stripped.len() < text.len() && (stripped.is_empty() || stripped.ends_with(' ')) {
        format!("{stripped}\\{}", &text[stripped.len()..])
    } else {
        text.to_string()
    }
}

/// Escape brackets in a link label that are not escaped already.
fn escape_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut escaped = false;
    for ch in label.chars() {
        if !escaped && matches!(ch, '[' | ']') {
            out.push('\\');
        }
        escaped = !escaped && ch == '\\';
        out.push(ch);
    }
    out
}

/// Wrap a link destination in angle brackets when it contains characters
/// that would end it early.
fn link_target(target: &str) -> String {
    if target.contains([' ', '(', ')']) {
        format!("<{target}>")
    } else {
        target.to_string()
    }
}

fn list(ordered: bool, items: &[ListItem]) -> String {
    let mut lines: Vec<String> = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let marker = if ordered {
            format!("{}. ", index + 1)
        } else {
            "- ".to_string()
        };
        let indent = " ".repeat(marker.len());

        let mut text_lines = item.text.lines();
        match text_lines.next().map(str::trim) {
            Some(first) if !first.is_empty() => {
                lines.push(format!("{marker}{}", escape_line_start(first)));
            }
            _ => lines.push(marker.trim_end().to_string()),
        }
        lines.extend(
            text_lines.map(|line| format!("{indent}{}", escape_line_start(line.trim()))),
        );

        for child in &item.children {
            for line in block(child).lines() {
                if line.is_empty() {
                    lines.push(String::new());
                } else {
                    lines.push(format!("{indent}{line}"));
                }
            }
        }
    }

    lines.join("\n")
}

fn code_block(language: Option<&str>, code: &str) -> String {
    let longest_run = code
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat((longest_run + 1).max(3));
    let language = language.map(str::trim).unwrap_or_default();
    let code = code.trim_end_matches('\n');

    format!("{fence}{language}\n{code}\n{fence}")
}

fn table(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return String::new();
    }

    let render_row = |row: &Vec<String>| {
        let cells: Vec<String> = (0..columns)
            .map(|i| row.get(i).map(|c| one_line(c)).unwrap_or_default())
            .collect();
        format!("| {} |", cells.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render_row(&rows[0]));
    lines.push(format!("| {} |", vec!["---"; columns].join(" | ")));
    lines.extend(rows[1..].iter().map(render_row));

    lines.join("\n")
}

fn quote(blocks: &[ContentBlock]) -> String {
    let inner = blocks
        .iter()
        .map(block)
        .filter(|rendered| !rendered.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    inner
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
