//! Output templates with `{{placeholder}}` substitution.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use htmlcmd_shared::ContentModel;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(title|source_url|content)\s*\}\}").expect("valid regex")
});

/// Fill `template` with the model's title, source URL, and rendered `body`.
///
/// Substitution is a single pass, so placeholder-like text inside the body is
/// never expanded. A template without `{{content}}` gets the body appended
/// after a blank line. The result ends with exactly one newline.
pub fn render_template(template: &str, model: &ContentModel, body: &str) -> String {
    let body = body.trim_end_matches('\n');
    let mut saw_content = false;

    let filled = PLACEHOLDER_RE.replace_all(template, |caps: &Captures| match &caps[1] {
        "title" => model.title.clone(),
        "source_url" => model.source_url.clone(),
        _ => {
            saw_content = true;
            body.to_string()
        }
    });

    let mut out = filled.trim_end().to_string();
    if !saw_content {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(body);
    }
    out.push('\n');
    out
}
