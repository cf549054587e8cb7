//! Post-render cleanup pipeline for Markdown output.
//!
//! Each pass is a function `&str -> String` applied in sequence. Lines inside
//! fenced code blocks are left untouched by every pass.

/// Run the full cleanup pipeline on rendered Markdown.
pub(crate) fn run_pipeline(md: &str) -> String {
    let mut result = md.to_string();

    result = clean_blank_lines(&result);
    result = normalize_whitespace(&result);
    result = ensure_trailing_newline(&result);

    result
}

// ---------------------------------------------------------------------------
// Fence tracking
// ---------------------------------------------------------------------------

/// Tracks whether the current line sits inside a fenced code block.
#[derive(Default)]
struct FenceTracker {
    open: Option<(char, usize)>,
}

impl FenceTracker {
    /// Feed `line`; returns true when it is fence or code content.
    fn observe(&mut self, line: &str) -> bool {
        let stripped = line.trim_start_matches(|c: char| c == '>' || c.is_whitespace());
        let marker = stripped.chars().next().filter(|c| *c == '`' || *c == '~');
        let run = marker.map_or(0, |m| stripped.chars().take_while(|c| *c == m).count());

        match (self.open, marker) {
            (Some((ch, len)), Some(m)) if m == ch && run >= len && stripped.trim_end().len() == run => {
                self.open = None;
                true
            }
            (Some(_), _) => true,
            (None, Some(m)) if run >= 3 => {
                self.open = Some((m, run));
                true
            }
            (None, _) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Pass 1: Clean up excessive blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of blank lines outside code into a single blank line.
fn clean_blank_lines(md: &str) -> String {
    let mut fences = FenceTracker::default();
    let mut lines: Vec<&str> = Vec::new();
    let mut prev_blank = false;

    for line in md.lines() {
        if fences.observe(line) {
            lines.push(line);
            prev_blank = false;
            continue;
        }

        let blank = line.trim().is_empty();
        if blank && prev_blank {
            continue;
        }
        prev_blank = blank;
        lines.push(line);
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Normalize whitespace
// ---------------------------------------------------------------------------

/// Trim trailing whitespace on every line outside code.
fn normalize_whitespace(md: &str) -> String {
    let mut fences = FenceTracker::default();
    md.lines()
        .map(|line| {
            if fences.observe(line) {
                line
            } else {
                line.trim_end()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 3: Ensure trailing newline
// ---------------------------------------------------------------------------

/// Ensure the output ends with exactly one newline.
fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_start_matches('\n').trim_end();
    format!("{trimmed}\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
