//! Inline rendering: turns phrasing content into Markdown-marked text.
//!
//! Used for heading text, table cells, and inline formatting elements inside
//! text runs. Block structure below an element is flattened here; callers that
//! need blocks walk the element instead.

use std::collections::HashSet;

use scraper::node::Node;
use scraper::ElementRef;
use url::Url;

use htmlcmd_shared::escape_inline;

/// Elements that always render their children as formatted inline text.
pub(crate) const FORMATTING_TAGS: &[&str] = &[
    "strong", "b", "em", "i", "del", "s", "strike", "code", "kbd", "samp", "tt",
];

/// Shared lookup state for resolving URLs and skipping subtrees.
#[derive(Clone, Copy)]
pub(crate) struct InlineContext<'a> {
    pub base: &'a Url,
    pub skip: &'a HashSet<String>,
}

impl InlineContext<'_> {
    pub(crate) fn skips(&self, tag: &str) -> bool {
        super::ALWAYS_SKIPPED.contains(&tag) || self.skip.contains(tag)
    }
}

/// Render the children of `el` as a single line of marked-up text.
pub(crate) fn render_children(el: ElementRef<'_>, ctx: InlineContext<'_>) -> String {
    let mut out = String::new();
    for child in el.children() {
        match child.value() {
            Node::Text(text) => push_escaped(&mut out, text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    render_element(child_el, ctx, &mut out);
                }
            }
            _ => {}
        }
    }
    out
}

/// Render `el` itself (markers included) onto `out`.
pub(crate) fn render_element(el: ElementRef<'_>, ctx: InlineContext<'_>, out: &mut String) {
    let tag = el.value().name();
    if ctx.skips(tag) {
        return;
    }

    match tag {
        "strong" | "b" => push_wrapped(out, &render_children(el, ctx), "**", "**"),
        "em" | "i" => push_wrapped(out, &render_children(el, ctx), "*", "*"),
        "del" | "s" | "strike" => push_wrapped(out, &render_children(el, ctx), "~~", "~~"),
        "code" | "kbd" | "samp" | "tt" => {
            let text: String = el.text().collect();
            push_code_span(out, &text);
        }
        "a" => {
            let inner = render_children(el, ctx);
            match el.value().attr("href").and_then(|h| resolve_href(h, ctx.base)) {
                Some(href) if !inner.trim().is_empty() => {
                    push_wrapped(out, &inner, "[", &format!("]({href})"));
                }
                _ => push_fragment(out, &inner),
            }
        }
        "img" => {
            if let Some(src) = image_src(el, ctx.base) {
                let alt = image_alt(el);
                out.push_str(&format!("![{alt}]({src})"));
            }
        }
        "br" => push_collapsed(out, " "),
        _ => {
            let inner = render_children(el, ctx);
            push_fragment(out, &inner);
        }
    }
}

// ---------------------------------------------------------------------------
// Text assembly helpers
// ---------------------------------------------------------------------------

/// Append `text`, collapsing every whitespace run to a single space.
pub(crate) fn push_collapsed(out: &mut String, text: &str) {
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !out.ends_with(' ') && !out.ends_with('\n') {
                out.push(' ');
            }
        } else {
            out.push(ch);
        }
    }
}

/// Append literal DOM text, escaping Markdown syntax and collapsing whitespace.
pub(crate) fn push_escaped(out: &mut String, text: &str) {
    push_collapsed(out, &escape_inline(text));
}

/// Append an already-rendered fragment without doubling boundary spaces.
pub(crate) fn push_fragment(out: &mut String, fragment: &str) {
    if fragment.starts_with(' ') && (out.ends_with(' ') || out.ends_with('\n')) {
        out.push_str(&fragment[1..]);
    } else {
        out.push_str(fragment);
    }
}

/// Wrap the trimmed `inner` with `open`/`close`, keeping boundary spaces outside
/// the markers. Whitespace-only content is emitted without markers.
pub(crate) fn push_wrapped(out: &mut String, inner: &str, open: &str, close: &str) {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        push_collapsed(out, inner);
        return;
    }
    if inner.starts_with(char::is_whitespace) {
        push_collapsed(out, " ");
    }
    out.push_str(open);
    out.push_str(trimmed);
    out.push_str(close);
    if inner.ends_with(char::is_whitespace) {
        push_collapsed(out, " ");
    }
}

/// Append a code span, choosing a backtick fence longer than any run inside.
fn push_code_span(out: &mut String, text: &str) {
    let mut flat = String::new();
    push_collapsed(&mut flat, text);
    let flat = flat.trim();
    if flat.is_empty() {
        return;
    }

    let longest_run = flat
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest_run + 1);
    let pad = if flat.starts_with('`') || flat.ends_with('`') {
        " "
    } else {
        ""
    };
    out.push_str(&format!("{fence}{pad}{flat}{pad}{fence}"));
}

/// Collapse whitespace and trim; the canonical form of single-line text.
pub(crate) fn normalize(text: &str) -> String {
    let mut out = String::new();
    push_collapsed(&mut out, text);
    out.trim().to_string()
}

// ---------------------------------------------------------------------------
// URL helpers
// ---------------------------------------------------------------------------

/// Resolve an `href` against `base`. Script links and empty values yield `None`.
pub(crate) fn resolve_href(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(String::from)
}

/// Absolute source of an `<img>`, preferring lazy-load attributes over a
/// `data:` placeholder in `src`.
pub(crate) fn image_src(el: ElementRef<'_>, base: &Url) -> Option<String> {
    let attr = |name: &str| {
        el.value()
            .attr(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let src = attr("src");
    let lazy = attr("data-src").or_else(|| attr("data-original"));

    let chosen = match (src, lazy) {
        (Some(s), Some(l)) if s.starts_with("data:") => l,
        (Some(s), _) => s,
        (None, Some(l)) => l,
        (None, None) => return None,
    };
    base.join(chosen).ok().map(String::from)
}

/// Alt text of an `<img>`, falling back to its title attribute.
pub(crate) fn image_alt(el: ElementRef<'_>) -> String {
    let alt = el
        .value()
        .attr("alt")
        .or_else(|| el.value().attr("title"))
        .unwrap_or_default();
    normalize(alt).replace(['[', ']'], "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn render(html: &str) -> String {
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse("p").unwrap();
        let p = doc.select(&sel).next().expect("fixture has <p>");
        let base = Url::parse("https://example.com/docs/page").unwrap();
        let skip = HashSet::new();
        normalize(&render_children(p, InlineContext { base: &base, skip: &skip }))
    }

    #[test]
    fn bold_and_italic_markers() {
        assert_eq!(
            render("<p>a <strong>bold</strong> and <em>italic</em> word</p>"),
            "a **bold** and *italic* word"
        );
    }

    #[test]
    fn boundary_spaces_move_outside_markers() {
        assert_eq!(render("<p>x<b> y </b>z</p>"), "x **y** z");
    }

    #[test]
    fn code_span_fence_grows_with_backticks() {
        assert_eq!(render("<p><code>a`b</code></p>"), "``a`b``");
        assert_eq!(render("<p><code>plain</code></p>"), "`plain`");
    }

    #[test]
    fn links_are_resolved() {
        assert_eq!(
            render(r#"<p>see <a href="../api">the API</a>.</p>"#),
            "see [the API](https://example.com/api)."
        );
    }

    #[test]
    fn javascript_links_degrade_to_text() {
        assert_eq!(
            render(r#"<p><a href="javascript:void(0)">click</a></p>"#),
            "click"
        );
    }

    #[test]
    fn literal_text_is_escaped() {
        assert_eq!(
            render("<p>Use &lt;div&gt; and *stars* in snake_case</p>"),
            "Use \\<div> and \\*stars\\* in snake\\_case"
        );
        assert_eq!(render("<p>[1]: https://x/</p>"), "\\[1\\]: https://x/");
    }

    #[test]
    fn code_span_text_is_not_escaped() {
        assert_eq!(render("<p><code>a_b*c</code></p>"), "`a_b*c`");
    }

    #[test]
    fn link_text_is_escaped_inside_markup() {
        assert_eq!(
            render(r#"<p><a href="/x">a]b</a></p>"#),
            "[a\\]b](https://example.com/x)"
        );
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(render("<p>  many\n\n   spaces\there </p>"), "many spaces here");
    }

    #[test]
    fn resolve_href_forms() {
        let base = Url::parse("https://example.com/blog/post").unwrap();
        assert_eq!(
            resolve_href("//cdn.example.net/x.js", &base).as_deref(),
            Some("https://cdn.example.net/x.js")
        );
        assert_eq!(
            resolve_href("#top", &base).as_deref(),
            Some("https://example.com/blog/post#top")
        );
        assert_eq!(
            resolve_href("other", &base).as_deref(),
            Some("https://example.com/blog/other")
        );
        assert_eq!(resolve_href("  ", &base), None);
    }
}
