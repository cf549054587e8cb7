//! Markdown serialization of the htmlcmd content model.
//!
//! [`MarkdownConverter::convert`] renders each block with fixed rules, joins
//! blocks with one blank line, then runs a small cleanup pipeline that trims
//! trailing whitespace and guarantees a single trailing newline. Output is a
//! pure function of the model and options.

mod cleanup;
mod render;
mod template;

use tracing::{debug, instrument};

use htmlcmd_shared::{ContentBlock, ContentModel, OutputConfig, escape_inline};

pub use template::render_template;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Options for Markdown serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Emit the model title as a leading `#` heading.
    pub include_title: bool,
    /// Prepend YAML frontmatter with `source_url` and `title`.
    pub frontmatter: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            include_title: true,
            frontmatter: false,
        }
    }
}

impl From<&OutputConfig> for ConvertOptions {
    fn from(config: &OutputConfig) -> Self {
        Self {
            include_title: config.include_title,
            frontmatter: config.frontmatter,
        }
    }
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Serializes [`ContentModel`]s to Markdown.
#[derive(Debug, Clone, Default)]
pub struct MarkdownConverter {
    options: ConvertOptions,
}

impl MarkdownConverter {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    /// Render `model` as Markdown.
    ///
    /// The title heading is skipped when the first block is already a level-1
    /// heading with the same text.
    #[instrument(skip_all, fields(url = %model.source_url, blocks = model.content.len()))]
    pub fn convert(&self, model: &ContentModel) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(model.content.len() + 1);

        let title = render::one_line(&model.title);
        let escaped_title = escape_inline(&title);
        if self.options.include_title
            && !title.is_empty()
            && !starts_with_title(model, &escaped_title)
        {
            parts.push(format!("# {}", render::heading_text(&escaped_title)));
        }

        parts.extend(
            model
                .content
                .iter()
                .map(render::block)
                .filter(|rendered| !rendered.trim().is_empty()),
        );

        let body = cleanup::run_pipeline(&parts.join("\n\n"));

        let markdown = if self.options.frontmatter {
            format!("{}{body}", build_frontmatter(&model.source_url, &title))
        } else {
            body
        };

        debug!(final_len = markdown.len(), "markdown rendered");
        markdown
    }
}

/// Render `model` with default options.
pub fn convert(model: &ContentModel) -> String {
    MarkdownConverter::default().convert(model)
}

fn starts_with_title(model: &ContentModel, title: &str) -> bool {
    matches!(
        model.content.first(),
        Some(ContentBlock::Heading { level: 1, text }) if render::one_line(text) == title
    )
}

/// Build a YAML frontmatter block.
fn build_frontmatter(source_url: &str, title: &str) -> String {
    let mut fm = String::from("---\n");
    fm.push_str(&format!("source_url: \"{}\"\n", escape_yaml_string(source_url)));
    fm.push_str(&format!("title: \"{}\"\n", escape_yaml_string(title)));
    fm.push_str("---\n\n");
    fm
}

/// Escape special characters in a YAML string value.
fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use htmlcmd_shared::ListItem;

    fn model(blocks: Vec<ContentBlock>) -> ContentModel {
        ContentModel {
            title: "Doc".into(),
            content: blocks,
            source_url: "https://example.com/doc".into(),
        }
    }

    fn body(blocks: Vec<ContentBlock>) -> String {
        MarkdownConverter::new(ConvertOptions {
            include_title: false,
            frontmatter: false,
        })
        .convert(&model(blocks))
    }

    #[test]
    fn heading_levels() {
        assert_eq!(body(vec![ContentBlock::heading(3, "Title")]), "### Title\n");
        assert_eq!(body(vec![ContentBlock::heading(1, "Top")]), "# Top\n");
    }

    #[test]
    fn blocks_separated_by_one_blank_line() {
        let md = body(vec![
            ContentBlock::heading(2, "Section"),
            ContentBlock::text("First paragraph."),
            ContentBlock::text("Second paragraph."),
        ]);
        assert_eq!(md, "## Section\n\nFirst paragraph.\n\nSecond paragraph.\n");
    }

    #[test]
    fn unordered_and_ordered_lists() {
        let md = body(vec![
            ContentBlock::List {
                ordered: false,
                items: vec![ListItem::new("a"), ListItem::new("b")],
            },
            ContentBlock::List {
                ordered: true,
                items: vec![
                    ListItem::new("one"),
                    ListItem::new("two"),
                    ListItem::new("three"),
                ],
            },
        ]);
        assert_eq!(md, "- a\n- b\n\n1. one\n2. two\n3. three\n");
    }

    #[test]
    fn nested_list_is_indented_by_marker_width() {
        let md = body(vec![ContentBlock::List {
            ordered: true,
            items: vec![ListItem {
                text: "parent".into(),
                children: vec![ContentBlock::List {
                    ordered: false,
                    items: vec![ListItem::new("child")],
                }],
            }],
        }]);
        assert_eq!(md, "1. parent\n   - child\n");
    }

    #[test]
    fn code_block_fenced_with_language() {
        let md = body(vec![ContentBlock::Code {
            language: Some("rust".into()),
            code: "fn main() {\n    let x = 1;   \n}".into(),
        }]);
        assert_eq!(md, "```rust\nfn main() {\n    let x = 1;   \n}\n```\n");
    }

    #[test]
    fn code_block_fence_outgrows_content() {
        let md = body(vec![ContentBlock::Code {
            language: None,
            code: "```\nnested\n```".into(),
        }]);
        assert_eq!(md, "````\n```\nnested\n```\n````\n");
    }

    #[test]
    fn table_has_separator_row() {
        let md = body(vec![ContentBlock::Table {
            rows: vec![
                vec!["Name".into(), "Value".into()],
                vec!["foo".into(), "bar".into()],
            ],
        }]);
        assert_eq!(md, "| Name | Value |\n| --- | --- |\n| foo | bar |\n");
    }

    #[test]
    fn image_prefers_local_path() {
        let remote = body(vec![ContentBlock::image("https://example.com/a.png", "A")]);
        assert_eq!(remote, "![A](https://example.com/a.png)\n");

        let local = body(vec![ContentBlock::Image {
            src: "https://example.com/a.png".into(),
            alt: "A".into(),
            local_path: Some("images/abc.png".into()),
        }]);
        assert_eq!(local, "![A](images/abc.png)\n");
    }

    #[test]
    fn link_text_falls_back_to_url() {
        let md = body(vec![
            ContentBlock::Link {
                href: "https://example.com/x".into(),
                text: "X".into(),
            },
            ContentBlock::Link {
                href: "https://example.com/y".into(),
                text: String::new(),
            },
        ]);
        assert_eq!(
            md,
            "[X](https://example.com/x)\n\n[https://example.com/y](https://example.com/y)\n"
        );
    }

    #[test]
    fn quote_prefixes_every_line_recursively() {
        let md = body(vec![ContentBlock::Quote {
            blocks: vec![
                ContentBlock::text("outer"),
                ContentBlock::Quote {
                    blocks: vec![ContentBlock::text("inner")],
                },
            ],
        }]);
        assert_eq!(md, "> outer\n>\n> > inner\n");
    }

    #[test]
    fn title_emitted_unless_first_block_repeats_it() {
        let converter = MarkdownConverter::default();

        let md = converter.convert(&model(vec![ContentBlock::text("body")]));
        assert_eq!(md, "# Doc\n\nbody\n");

        let md = converter.convert(&model(vec![
            ContentBlock::heading(1, "Doc"),
            ContentBlock::text("body"),
        ]));
        assert_eq!(md, "# Doc\n\nbody\n");
    }

    #[test]
    fn title_heading_is_escaped_but_frontmatter_is_literal() {
        let converter = MarkdownConverter::new(ConvertOptions {
            include_title: true,
            frontmatter: true,
        });
        let mut m = model(vec![ContentBlock::text("body")]);
        m.title = "snake_case #".into();
        let md = converter.convert(&m);
        assert!(md.contains("title: \"snake_case #\"\n"), "{md}");
        assert!(md.ends_with("---\n\n# snake\\_case \\#\n\nbody\n"), "{md}");

        let mut m = model(vec![
            ContentBlock::heading(1, "snake\\_case"),
            ContentBlock::text("body"),
        ]);
        m.title = "snake_case".into();
        assert_eq!(convert(&m), "# snake\\_case\n\nbody\n");
    }

    #[test]
    fn frontmatter_block() {
        let converter = MarkdownConverter::new(ConvertOptions {
            include_title: false,
            frontmatter: true,
        });
        let mut m = model(vec![ContentBlock::text("body")]);
        m.title = "Say \"hi\"".into();
        let md = converter.convert(&m);
        assert!(md.starts_with("---\nsource_url: \"https://example.com/doc\"\n"));
        assert!(md.contains("title: \"Say \\\"hi\\\"\"\n---\n\nbody\n"));
    }

    #[test]
    fn ends_with_exactly_one_newline_and_no_trailing_spaces() {
        let md = body(vec![
            ContentBlock::text("line with spaces   "),
            ContentBlock::Markdown {
                content: "raw\n\n\n\n".into(),
            },
        ]);
        assert_eq!(md, "line with spaces\n\nraw\n");
    }

    #[test]
    fn empty_model_is_single_newline() {
        assert_eq!(body(vec![]), "\n");
    }

    #[test]
    fn conversion_is_deterministic() {
        let m = model(vec![
            ContentBlock::heading(2, "H"),
            ContentBlock::List {
                ordered: true,
                items: vec![ListItem::new("x"), ListItem::new("y")],
            },
            ContentBlock::Table {
                rows: vec![vec!["a".into()], vec!["b".into()]],
            },
            ContentBlock::Quote {
                blocks: vec![ContentBlock::image("https://example.com/i.png", "i")],
            },
        ]);
        let converter = MarkdownConverter::default();
        assert_eq!(converter.convert(&m), converter.convert(&m.clone()));
    }
}
