//! Depth-first DOM walk that classifies elements into content blocks.
//!
//! Classification priority: heading > list > table > pre > blockquote >
//! image > anchor > generic text container. Text and inline formatting
//! accumulate in an [`InlineRun`] until a block-level boundary flushes it.

use std::sync::LazyLock;

use regex::Regex;
use scraper::node::Node;
use scraper::ElementRef;
use tracing::trace;

use htmlcmd_shared::{ContentBlock, ListItem};

use crate::inline::{self, InlineContext, FORMATTING_TAGS};

/// Generic containers that start and end a text run.
const BLOCK_CONTAINERS: &[&str] = &[
    "html", "body", "main", "article", "section", "div", "p", "header", "footer", "aside",
    "figure", "figcaption", "address", "details", "summary", "dl", "dt", "dd", "form",
    "fieldset", "center", "hgroup", "li", "caption", "tr", "td", "th", "thead", "tbody",
    "tfoot",
];

/// Elements with their own block mapping.
const BLOCK_ELEMENTS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "table", "pre", "blockquote", "img", "hr",
];

// ---------------------------------------------------------------------------
// Inline run
// ---------------------------------------------------------------------------

/// A standalone-link candidate recorded while building a run.
struct RunLink {
    href: String,
    text: String,
    markup: String,
}

/// Pending paragraph text between two block boundaries.
#[derive(Default)]
struct InlineRun {
    text: String,
    links: Vec<RunLink>,
    /// A `<br>` was seen and has not been written yet.
    pending_break: bool,
}

impl InlineRun {
    fn push_text(&mut self, text: &str) {
        self.settle_break(text);
        inline::push_escaped(&mut self.text, text);
    }

    fn push_fragment(&mut self, fragment: &str) {
        self.settle_break(fragment);
        inline::push_fragment(&mut self.text, fragment);
    }

    fn push_link(&mut self, href: String, inner: &str) {
        self.settle_break(inner);
        let text = inline::normalize(inner);
        let markup = format!("[{text}]({href})");
        inline::push_wrapped(&mut self.text, inner, "[", &format!("]({href})"));
        self.links.push(RunLink { href, text, markup });
    }

    /// Record a hard line break. Breaks at the start or end of a run, and
    /// repeated breaks, collapse away.
    fn push_break(&mut self) {
        if !self.text.trim().is_empty() {
            self.pending_break = true;
        }
    }

    /// Write a pending break once real content follows it.
    fn settle_break(&mut self, next: &str) {
        if !self.pending_break || next.trim().is_empty() {
            return;
        }
        self.pending_break = false;
        let trimmed_len = self.text.trim_end().len();
        self.text.truncate(trimmed_len);
        self.text.push_str("\\\n");
    }

    /// Close the run. Whitespace-only runs produce no block; a run holding
    /// exactly one link and nothing else becomes a [`ContentBlock::Link`].
    fn into_block(self) -> Option<ContentBlock> {
        let joined = self
            .text
            .split('\n')
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n");
        let text = joined.trim();

        if text.is_empty() {
            return None;
        }

        if let [link] = self.links.as_slice() {
            if text == link.markup {
                return Some(ContentBlock::Link {
                    href: link.href.clone(),
                    text: link.text.clone(),
                });
            }
        }

        Some(ContentBlock::text(text))
    }
}

// ---------------------------------------------------------------------------
// Walker
// ---------------------------------------------------------------------------

/// Collects blocks from a subtree in document order.
pub(crate) struct Walker<'a> {
    ctx: InlineContext<'a>,
    blocks: Vec<ContentBlock>,
    run: InlineRun,
}

impl<'a> Walker<'a> {
    pub(crate) fn new(ctx: InlineContext<'a>) -> Self {
        Self {
            ctx,
            blocks: Vec::new(),
            run: InlineRun::default(),
        }
    }

    /// Walk `el`'s children and return the resulting blocks.
    pub(crate) fn collect(ctx: InlineContext<'a>, el: ElementRef<'_>) -> Vec<ContentBlock> {
        let mut walker = Self::new(ctx);
        walker.walk_children(el);
        walker.finish()
    }

    pub(crate) fn finish(mut self) -> Vec<ContentBlock> {
        self.flush();
        self.blocks
    }

    pub(crate) fn walk_children(&mut self, el: ElementRef<'_>) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => self.run.push_text(text),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.visit(child_el);
                    }
                }
                _ => {}
            }
        }
    }

    fn flush(&mut self) {
        if let Some(block) = std::mem::take(&mut self.run).into_block() {
            self.blocks.push(block);
        }
    }

    fn push_block(&mut self, block: ContentBlock) {
        self.flush();
        self.blocks.push(block);
    }

    fn visit(&mut self, el: ElementRef<'_>) {
        let tag = el.value().name();
        if self.ctx.skips(tag) {
            trace!(tag, "skipping subtree");
            return;
        }

        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush();
                let level = tag[1..].parse().unwrap_or(1);
                let text = inline::normalize(&inline::render_children(el, self.ctx));
                if !text.is_empty() {
                    self.blocks.push(ContentBlock::heading(level, text));
                }
            }
            "ul" | "ol" => {
                self.flush();
                if let Some(list) = self.list(el, tag == "ol") {
                    self.blocks.push(list);
                }
            }
            "table" => {
                self.flush();
                if let Some(table) = self.table(el) {
                    self.blocks.push(table);
                }
            }
            "pre" => {
                self.flush();
                if let Some(code) = code_block(el) {
                    self.blocks.push(code);
                }
            }
            "blockquote" => {
                self.flush();
                let blocks = Self::collect(self.ctx, el);
                if !blocks.is_empty() {
                    self.blocks.push(ContentBlock::Quote { blocks });
                }
            }
            "img" => {
                if let Some(src) = inline::image_src(el, self.ctx.base) {
                    self.push_block(ContentBlock::image(src, inline::image_alt(el)));
                }
            }
            "a" => self.anchor(el),
            "br" => self.run.push_break(),
            "hr" => self.push_block(ContentBlock::Markdown {
                content: "---".into(),
            }),
            _ if FORMATTING_TAGS.contains(&tag) => {
                if has_structural_descendant(el) {
                    self.walk_children(el);
                } else {
                    let mut rendered = String::new();
                    inline::render_element(el, self.ctx, &mut rendered);
                    self.run.push_fragment(&rendered);
                }
            }
            _ if BLOCK_CONTAINERS.contains(&tag) => {
                self.flush();
                self.walk_children(el);
                self.flush();
            }
            // Unknown or phrasing elements degrade to their contents.
            _ => self.walk_children(el),
        }
    }

    fn anchor(&mut self, el: ElementRef<'_>) {
        let href = el
            .value()
            .attr("href")
            .and_then(|h| inline::resolve_href(h, self.ctx.base));

        if has_structural_descendant(el) {
            // Card-style links wrap plain containers; keep the target.
            match href.zip(self.flattened_text(el)) {
                Some((href, text)) => self.push_block(ContentBlock::Link { href, text }),
                None => self.walk_children(el),
            }
            return;
        }

        let inner = inline::render_children(el, self.ctx);
        match href {
            Some(href) if !inner.trim().is_empty() => self.run.push_link(href, &inner),
            _ => self.run.push_fragment(&inner),
        }
    }

    /// Text of `el` joined onto one line, if its subtree yields only text blocks.
    fn flattened_text(&self, el: ElementRef<'_>) -> Option<String> {
        let blocks = Self::collect(self.ctx, el);
        let mut parts = Vec::with_capacity(blocks.len());
        for block in &blocks {
            match block {
                ContentBlock::Text { text } => parts.push(text.replace("\\\n", " ")),
                _ => return None,
            }
        }
        let text = parts.join(" ");
        (!text.is_empty()).then_some(text)
    }

    fn list(&self, el: ElementRef<'_>, ordered: bool) -> Option<ContentBlock> {
        let mut items: Vec<ListItem> = Vec::new();

        for child in el.children().filter_map(ElementRef::wrap) {
            let tag = child.value().name();
            if self.ctx.skips(tag) {
                continue;
            }

            match tag {
                // A list nested directly in a list belongs to the previous item.
                "ul" | "ol" => {
                    if let Some(nested) = self.list(child, tag == "ol") {
                        match items.last_mut() {
                            Some(last) => last.children.push(nested),
                            None => items.push(ListItem {
                                text: String::new(),
                                children: vec![nested],
                            }),
                        }
                    }
                }
                _ => {
                    let item = self.list_item(child);
                    if !item.text.is_empty() || !item.children.is_empty() {
                        items.push(item);
                    }
                }
            }
        }

        if items.is_empty() {
            None
        } else {
            Some(ContentBlock::List { ordered, items })
        }
    }

    fn list_item(&self, li: ElementRef<'_>) -> ListItem {
        let mut children = Self::collect(self.ctx, li);

        let text = match children.first() {
            Some(ContentBlock::Text { text }) => Some(text.clone()),
            Some(ContentBlock::Link { href, text }) => Some(format!("[{text}]({href})")),
            _ => None,
        };

        match text {
            Some(text) => {
                children.remove(0);
                ListItem { text, children }
            }
            None => ListItem {
                text: String::new(),
                children,
            },
        }
    }

    fn table(&self, el: ElementRef<'_>) -> Option<ContentBlock> {
        let table_id = el.id();
        let mut rows: Vec<Vec<String>> = Vec::new();

        let rows_iter = el
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|d| d.value().name() == "tr")
            // Rows of nested tables belong to those tables.
            .filter(|tr| {
                tr.ancestors()
                    .filter_map(ElementRef::wrap)
                    .find(|a| a.value().name() == "table")
                    .is_some_and(|t| t.id() == table_id)
            });

        for tr in rows_iter {
            let cells: Vec<String> = tr
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "th" | "td"))
                .map(|cell| escape_cell(&inline::render_children(cell, self.ctx)))
                .collect();

            if !cells.is_empty() {
                rows.push(cells);
            }
        }

        let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
        if col_count == 0 {
            return None;
        }

        for row in &mut rows {
            row.resize(col_count, String::new());
        }

        Some(ContentBlock::Table { rows })
    }
}

// ---------------------------------------------------------------------------
// Element helpers
// ---------------------------------------------------------------------------

/// Whether `el` contains anything that must become its own block.
fn has_structural_descendant(el: ElementRef<'_>) -> bool {
    el.descendants().skip(1).any(|node| {
        node.value().as_element().is_some_and(|e| {
            let name = e.name();
            BLOCK_ELEMENTS.contains(&name) || (name != "li" && BLOCK_CONTAINERS.contains(&name))
        })
    })
}

/// Build a code block from a `<pre>`, keeping its text verbatim.
fn code_block(pre: ElementRef<'_>) -> Option<ContentBlock> {
    let raw: String = pre.text().collect();
    let code = raw.trim_matches(|c| c == '\n' || c == '\r');
    if code.trim().is_empty() {
        return None;
    }

    Some(ContentBlock::Code {
        language: code_language(pre),
        code: code.to_string(),
    })
}

/// Language hint from `<pre>` or its first `<code>` child class names.
fn code_language(pre: ElementRef<'_>) -> Option<String> {
    static LANG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(?:language|lang|highlight-source|highlight)-([A-Za-z0-9_+#.-]+)$")
            .expect("valid regex")
    });

    let code_child = pre
        .children()
        .filter_map(ElementRef::wrap)
        .find(|c| c.value().name() == "code");

    std::iter::once(pre)
        .chain(code_child)
        .flat_map(|el| el.value().classes())
        .find_map(|class| LANG_RE.captures(class).map(|c| c[1].to_lowercase()))
}

/// Flatten a cell to one line and escape pipe characters.
fn escape_cell(raw: &str) -> String {
    inline::normalize(raw).replace('|', "\\|")
}
