//! HTML content parsing into the htmlcmd content model.
//!
//! [`ContentParser::parse`] walks the DOM depth-first and produces a
//! [`ContentModel`] with every link and image URL resolved against the base URL.
//! Parsing never fails: `scraper` (html5ever) repairs malformed markup, and
//! elements the walker does not recognise degrade to their text.

mod inline;
mod walker;

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use htmlcmd_shared::{ContentBlock, ContentModel, ParserConfig, unescape};

use crate::inline::InlineContext;
use crate::walker::Walker;

/// Subtrees that never hold page content, whatever the configuration says.
pub(crate) const ALWAYS_SKIPPED: &[&str] = &["head", "title", "template", "script", "style"];

static BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));
static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Converts HTML documents into [`ContentModel`]s.
#[derive(Debug, Clone)]
pub struct ContentParser {
    skip_tags: HashSet<String>,
}

impl ContentParser {
    /// Create a parser that drops the subtrees named in `config.skip_tags`.
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            skip_tags: config
                .skip_tags
                .iter()
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Parse `html`, resolving relative URLs against `base_url`.
    ///
    /// The title comes from `<title>`, else the first heading, else the path
    /// of `base_url`.
    #[instrument(skip(self, html), fields(base_url = %base_url, html_len = html.len()))]
    pub fn parse(&self, html: &str, base_url: &Url) -> ContentModel {
        let doc = Html::parse_document(html);
        let ctx = InlineContext {
            base: base_url,
            skip: &self.skip_tags,
        };

        let root = doc
            .select(&BODY_SEL)
            .next()
            .unwrap_or_else(|| doc.root_element());
        let content = Walker::collect(ctx, root);

        let title = document_title(&doc)
            .or_else(|| first_heading(&content))
            .unwrap_or_else(|| title_from_url(base_url));

        debug!(blocks = content.len(), title = %title, "document parsed");

        ContentModel {
            title,
            content,
            source_url: base_url.to_string(),
        }
    }
}

impl Default for ContentParser {
    fn default() -> Self {
        Self::new(&ParserConfig::default())
    }
}

/// Parse `html` against `base_url` with the default parser configuration.
pub fn parse(html: &str, base_url: &Url) -> ContentModel {
    ContentParser::default().parse(html, base_url)
}

// ---------------------------------------------------------------------------
// Title extraction
// ---------------------------------------------------------------------------

/// The first non-empty HTML `<title>`. SVG and MathML titles label graphics
/// and are ignored.
fn document_title(doc: &Html) -> Option<String> {
    doc.select(&TITLE_SEL)
        .filter(|el| {
            !el.ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| matches!(a.value().name(), "svg" | "math"))
        })
        .map(|el| inline::normalize(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

/// Literal text of the first heading block.
fn first_heading(content: &[ContentBlock]) -> Option<String> {
    content.iter().find_map(|block| match block {
        ContentBlock::Heading { text, .. } => Some(unescape(text)),
        _ => None,
    })
}

fn title_from_url(url: &Url) -> String {
    let path = url.path().trim_matches('/');
    if !path.is_empty() {
        return path.to_string();
    }
    url.host_str()
        .map(String::from)
        .unwrap_or_else(|| "Untitled".to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use htmlcmd_shared::ListItem;

    fn base() -> Url {
        Url::parse("https://example.com/blog/post").unwrap()
    }

    fn blocks(html: &str) -> Vec<ContentBlock> {
        parse(html, &base()).content
    }

    // --- Title ---

    #[test]
    fn title_from_title_element() {
        let model = parse(
            "<html><head><title> My  Page </title></head><body><h1>Heading</h1></body></html>",
            &base(),
        );
        assert_eq!(model.title, "My Page");
        assert_eq!(model.source_url, "https://example.com/blog/post");
    }

    #[test]
    fn title_falls_back_to_first_heading() {
        let model = parse("<body><p>intro</p><h2>Second</h2><h1>First</h1></body>", &base());
        assert_eq!(model.title, "Second");
    }

    #[test]
    fn svg_title_is_not_the_document_title() {
        let model = parse(
            "<body><svg><title>icon</title><path d=\"M0\"/></svg><h1>Real Heading</h1></body>",
            &base(),
        );
        assert_eq!(model.title, "Real Heading");
        assert_eq!(model.content, vec![ContentBlock::heading(1, "Real Heading")]);
    }

    #[test]
    fn head_title_wins_over_svg_title() {
        let model = parse(
            "<html><head><title>Page</title></head><body><svg><title>icon</title></svg></body></html>",
            &base(),
        );
        assert_eq!(model.title, "Page");
    }

    #[test]
    fn heading_title_fallback_is_literal_text() {
        let model = parse("<h1>snake_case &amp; *stars*</h1>", &base());
        assert_eq!(model.content, vec![ContentBlock::heading(1, "snake\\_case & \\*stars\\*")]);
        assert_eq!(model.title, "snake_case & *stars*");
    }

    #[test]
    fn title_falls_back_to_url_path() {
        let model = parse("<p>no headings here</p>", &base());
        assert_eq!(model.title, "blog/post");

        let root = Url::parse("https://example.com/").unwrap();
        assert_eq!(parse("<p>x</p>", &root).title, "example.com");
    }

    // --- Block mapping ---

    #[test]
    fn headings_map_to_levels() {
        assert_eq!(
            blocks("<h3>Title</h3><h6>Deep</h6>"),
            vec![ContentBlock::heading(3, "Title"), ContentBlock::heading(6, "Deep")]
        );
    }

    #[test]
    fn paragraphs_keep_inline_markup() {
        assert_eq!(
            blocks("<p>Some <b>bold</b>, <i>italic</i> and <code>code</code>.</p>"),
            vec![ContentBlock::text("Some **bold**, *italic* and `code`.")]
        );
    }

    #[test]
    fn adjacent_paragraphs_are_separate_blocks() {
        assert_eq!(
            blocks("<p>one</p><p>two</p>"),
            vec![ContentBlock::text("one"), ContentBlock::text("two")]
        );
    }

    #[test]
    fn whitespace_only_runs_produce_no_blocks() {
        assert_eq!(
            blocks("<div>  \n </div><p>   </p><div><p>\t</p></div><p>kept</p>"),
            vec![ContentBlock::text("kept")]
        );
    }

    #[test]
    fn unordered_and_ordered_lists() {
        let got = blocks("<ul><li>a</li><li>b</li></ul><ol><li>first</li><li>second</li></ol>");
        assert_eq!(
            got,
            vec![
                ContentBlock::List {
                    ordered: false,
                    items: vec![ListItem::new("a"), ListItem::new("b")],
                },
                ContentBlock::List {
                    ordered: true,
                    items: vec![ListItem::new("first"), ListItem::new("second")],
                },
            ]
        );
    }

    #[test]
    fn nested_lists_become_item_children() {
        let got = blocks("<ul><li>parent<ul><li>child</li></ul></li></ul>");
        assert_eq!(
            got,
            vec![ContentBlock::List {
                ordered: false,
                items: vec![ListItem {
                    text: "parent".into(),
                    children: vec![ContentBlock::List {
                        ordered: false,
                        items: vec![ListItem::new("child")],
                    }],
                }],
            }]
        );
    }

    #[test]
    fn code_block_keeps_whitespace_and_language() {
        let got = blocks(
            "<pre><code class=\"language-rust\">fn main() {\n    println!(\"hi\");\n}\n</code></pre>",
        );
        assert_eq!(
            got,
            vec![ContentBlock::Code {
                language: Some("rust".into()),
                code: "fn main() {\n    println!(\"hi\");\n}".into(),
            }]
        );
    }

    #[test]
    fn code_language_from_pre_class() {
        let got = blocks("<pre class=\"highlight-source-python\">print(1)</pre>");
        assert_eq!(
            got,
            vec![ContentBlock::Code {
                language: Some("python".into()),
                code: "print(1)".into(),
            }]
        );
    }

    #[test]
    fn table_rows_are_padded_and_escaped() {
        let got = blocks(
            "<table><thead><tr><th>Name</th><th>Value</th></tr></thead>\
             <tbody><tr><td>a|b</td><td>1</td></tr><tr><td>short</td></tr></tbody></table>",
        );
        assert_eq!(
            got,
            vec![ContentBlock::Table {
                rows: vec![
                    vec!["Name".into(), "Value".into()],
                    vec!["a\\|b".into(), "1".into()],
                    vec!["short".into(), String::new()],
                ],
            }]
        );
    }

    #[test]
    fn nested_table_rows_stay_with_inner_table() {
        let got = blocks(
            "<table><tr><td>outer</td><td><table><tr><td>inner</td></tr></table></td></tr></table>",
        );
        match &got[0] {
            ContentBlock::Table { rows } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0][0], "outer");
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn blockquote_nests_blocks() {
        let got = blocks("<blockquote><p>quoted</p><h2>inside</h2></blockquote>");
        assert_eq!(
            got,
            vec![ContentBlock::Quote {
                blocks: vec![ContentBlock::text("quoted"), ContentBlock::heading(2, "inside")],
            }]
        );
    }

    #[test]
    fn standalone_anchor_becomes_link_block() {
        let got = blocks(r#"<p><a href="/about">About us</a></p>"#);
        assert_eq!(
            got,
            vec![ContentBlock::Link {
                href: "https://example.com/about".into(),
                text: "About us".into(),
            }]
        );
    }

    #[test]
    fn anchor_inside_text_stays_inline() {
        let got = blocks(r#"<p>Read <a href="next">more</a> here</p>"#);
        assert_eq!(
            got,
            vec![ContentBlock::text("Read [more](https://example.com/blog/next) here")]
        );
    }

    #[test]
    fn anchor_around_containers_keeps_its_target() {
        let got = blocks(r#"<a href="/x"><div>Card</div></a>"#);
        assert_eq!(
            got,
            vec![ContentBlock::Link {
                href: "https://example.com/x".into(),
                text: "Card".into(),
            }]
        );

        let got = blocks(r#"<p>before</p><a href="/y"><div>Title</div><p>Teaser</p></a>"#);
        assert_eq!(
            got,
            vec![
                ContentBlock::text("before"),
                ContentBlock::Link {
                    href: "https://example.com/y".into(),
                    text: "Title Teaser".into(),
                },
            ]
        );
    }

    #[test]
    fn anchor_around_headings_keeps_the_blocks() {
        let got = blocks(r#"<a href="/x"><h2>Post</h2><p>Summary</p></a>"#);
        assert_eq!(
            got,
            vec![ContentBlock::heading(2, "Post"), ContentBlock::text("Summary")]
        );
    }

    #[test]
    fn literal_markdown_characters_are_escaped() {
        assert_eq!(
            blocks("<p>Use &lt;div&gt; tags</p><p>[1]: https://x/</p>"),
            vec![
                ContentBlock::text("Use \\<div> tags"),
                ContentBlock::text("\\[1\\]: https://x/"),
            ]
        );
        assert_eq!(
            blocks(r#"<p><a href="/x">a]b</a></p>"#),
            vec![ContentBlock::Link {
                href: "https://example.com/x".into(),
                text: "a\\]b".into(),
            }]
        );
    }

    #[test]
    fn escaped_cells_keep_pipe_escapes() {
        let got = blocks("<table><tr><td>a_b|c</td></tr></table>");
        assert_eq!(
            got,
            vec![ContentBlock::Table {
                rows: vec![vec!["a\\_b\\|c".into()]],
            }]
        );
    }

    #[test]
    fn image_inside_paragraph_is_hoisted_in_order() {
        let got = blocks(r#"<p>before <img src="a.png" alt="A"> after</p>"#);
        assert_eq!(
            got,
            vec![
                ContentBlock::text("before"),
                ContentBlock::image("https://example.com/blog/a.png", "A"),
                ContentBlock::text("after"),
            ]
        );
    }

    #[test]
    fn linked_image_keeps_image_block() {
        let got = blocks(r#"<a href="/full.png"><img src="/thumb.png" alt="thumb"></a>"#);
        assert_eq!(
            got,
            vec![ContentBlock::image("https://example.com/thumb.png", "thumb")]
        );
    }

    #[test]
    fn lazy_image_source_preferred_over_placeholder() {
        let got = blocks(
            r#"<img src="data:image/gif;base64,R0lGOD" data-src="/real.jpg" alt="real">"#,
        );
        assert_eq!(
            got,
            vec![ContentBlock::image("https://example.com/real.jpg", "real")]
        );
    }

    #[test]
    fn image_without_source_is_dropped() {
        assert!(blocks(r#"<img alt="nothing">"#).is_empty());
    }

    #[test]
    fn line_breaks_become_hard_breaks() {
        assert_eq!(
            blocks("<p><br>line one<br><br>line two<br></p>"),
            vec![ContentBlock::text("line one\\\nline two")]
        );
    }

    #[test]
    fn horizontal_rule_is_raw_markdown() {
        assert_eq!(
            blocks("<p>a</p><hr><p>b</p>"),
            vec![
                ContentBlock::text("a"),
                ContentBlock::Markdown {
                    content: "---".into()
                },
                ContentBlock::text("b"),
            ]
        );
    }

    #[test]
    fn skipped_tags_are_removed() {
        let got = blocks(
            "<nav><a href=\"/\">Home</a></nav><script>var x = 1;</script>\
             <style>p{}</style><p>content</p>",
        );
        assert_eq!(got, vec![ContentBlock::text("content")]);
    }

    #[test]
    fn custom_skip_tags() {
        let parser = ContentParser::new(&ParserConfig {
            skip_tags: vec!["FOOTER".into()],
        });
        let model = parser.parse("<p>body</p><footer>legal</footer><nav>menu</nav>", &base());
        assert_eq!(
            model.content,
            vec![ContentBlock::text("body"), ContentBlock::text("menu")]
        );
    }

    // --- URL resolution ---

    #[test]
    fn relative_image_url_is_absolutized() {
        let got = blocks(r#"<img src="../img/a.png" alt="a">"#);
        assert_eq!(
            got,
            vec![ContentBlock::image("https://example.com/img/a.png", "a")]
        );
    }

    #[test]
    fn protocol_relative_and_fragment_links() {
        let got = blocks(
            r##"<p>x <a href="//cdn.example.org/lib">cdn</a> y <a href="#intro">top</a></p>"##,
        );
        assert_eq!(
            got,
            vec![ContentBlock::text(
                "x [cdn](https://cdn.example.org/lib) y [top](https://example.com/blog/post#intro)"
            )]
        );
    }

    #[test]
    fn every_url_in_model_is_absolute() {
        let model = parse(
            r#"<p><a href="a">a</a></p><img src="b.png"><ul><li><a href="/c">c</a></li></ul>
               <blockquote><img src="./d.png"></blockquote>"#,
            &base(),
        );
        let mut urls = Vec::new();
        model.visit_blocks(&mut |block| match block {
            ContentBlock::Image { src, .. } => urls.push(src.clone()),
            ContentBlock::Link { href, .. } => urls.push(href.clone()),
            _ => {}
        });
        assert_eq!(urls.len(), 3);
        assert!(urls.iter().all(|u| Url::parse(u).is_ok()), "{urls:?}");
    }

    // --- Resilience ---

    #[test]
    fn malformed_html_is_tolerated() {
        let model = parse(
            "<div><p>Hello <b>world</div><unknown-tag>Still here</unknown-tag><p>After<table><tr><td>cell",
            &base(),
        );
        let rendered = format!("{:?}", model.content);
        assert!(rendered.contains("Hello"));
        assert!(rendered.contains("Still here"));
        assert!(rendered.contains("After"));
        assert!(rendered.contains("cell"));
    }

    #[test]
    fn empty_input_yields_empty_model() {
        let model = parse("", &base());
        assert!(model.content.is_empty());
        assert_eq!(model.title, "blog/post");
    }

    #[test]
    fn block_order_matches_document_order() {
        let got = blocks("<h1>A</h1><p>b</p><ul><li>c</li></ul><pre>d</pre><img src=\"e.png\">");
        let kinds: Vec<&str> = got.iter().map(ContentBlock::kind).collect();
        assert_eq!(kinds, vec!["heading", "text", "list", "code", "image"]);
    }
}
