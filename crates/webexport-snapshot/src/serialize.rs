//! Tree walk over a parsed document: resource discovery and markup output
//! with rewrites applied.
//!
//! Both passes visit elements in the same pre-order, so the n-th stylesheet
//! link or image found by [`collect_resources`] is the n-th one seen by
//! [`rewrite`] when the same markup is parsed again.

use std::collections::{HashMap, HashSet};

use scraper::node::{Doctype, Element};
use scraper::{ElementRef, Html, Node};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &[
    "iframe", "noembed", "noframes", "noscript", "plaintext", "script", "style", "xmp",
];

/// External resources referenced by a document, in document order.
#[derive(Debug, Default)]
pub(crate) struct Resources {
    /// `href` of every enabled `<link rel="stylesheet">`, as written in the markup.
    pub stylesheets: Vec<String>,
    /// `src` of every `<img>` (`None` when the attribute is missing).
    pub images: Vec<Option<String>>,
}

/// Changes applied while serializing.
#[derive(Debug, Default)]
pub(crate) struct Rewrites {
    /// Style sheet texts appended, in order, at the end of `<head>`.
    pub head_styles: Vec<String>,
    /// Ordinals of stylesheet links to leave out.
    pub dropped_links: HashSet<usize>,
    /// Replacement `src` per image ordinal.
    pub image_sources: HashMap<usize, String>,
}

/// A `<link>` whose style sheet applies to the page. Alternate style sheets
/// are disabled until the user picks them, so they are not matched.
pub(crate) fn is_stylesheet_link(element: &Element) -> bool {
    if element.name() != "link" || !element.attr("href").is_some_and(|href| !href.trim().is_empty()) {
        return false;
    }
    let Some(rel) = element.attr("rel") else {
        return false;
    };
    let has = |wanted: &str| {
        rel.split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case(wanted))
    };
    has("stylesheet") && !has("alternate")
}

pub(crate) fn collect_resources(markup: &str) -> Resources {
    let document = Html::parse_document(markup);
    let mut resources = Resources::default();
    visit(document.root_element(), &mut |element| {
        let value = element.value();
        if is_stylesheet_link(value) {
            if let Some(href) = value.attr("href") {
                resources.stylesheets.push(href.trim().to_string());
            }
        } else if value.name() == "img" {
            resources.images.push(value.attr("src").map(|s| s.to_string()));
        }
    });
    resources
}

/// Parse `markup` and serialize its doctype and root element with `rewrites` applied.
pub(crate) fn rewrite(markup: &str, rewrites: &Rewrites) -> String {
    let document = Html::parse_document(markup);
    let mut writer = Writer {
        rewrites,
        out: String::with_capacity(markup.len()),
        link_index: 0,
        image_index: 0,
        head_done: false,
    };
    for node in document.tree.root().children() {
        if let Node::Doctype(doctype) = node.value() {
            write_doctype(doctype, &mut writer.out);
        }
    }
    writer.element(document.root_element());
    writer.out
}

/// Public and system identifiers decide the rendering mode, so they are kept.
fn write_doctype(doctype: &Doctype, out: &mut String) {
    out.push_str("<!DOCTYPE ");
    out.push_str(doctype.name());
    let public_id = doctype.public_id();
    let system_id = doctype.system_id();
    if !public_id.is_empty() {
        out.push_str(" PUBLIC \"");
        out.push_str(public_id);
        out.push('"');
        if !system_id.is_empty() {
            out.push_str(" \"");
            out.push_str(system_id);
            out.push('"');
        }
    } else if !system_id.is_empty() {
        out.push_str(" SYSTEM \"");
        out.push_str(system_id);
        out.push('"');
    }
    out.push('>');
}

fn visit<'a>(element: ElementRef<'a>, f: &mut impl FnMut(ElementRef<'a>)) {
    f(element);
    for child in element.children() {
        if let Some(child) = ElementRef::wrap(child) {
            visit(child, &mut *f);
        }
    }
}

struct Writer<'r> {
    rewrites: &'r Rewrites,
    out: String,
    link_index: usize,
    image_index: usize,
    head_done: bool,
}

impl Writer<'_> {
    fn element(&mut self, element: ElementRef<'_>) {
        let rewrites = self.rewrites;
        let value = element.value();
        let name = value.name();

        if is_stylesheet_link(value) {
            let index = self.link_index;
            self.link_index += 1;
            if rewrites.dropped_links.contains(&index) {
                return;
            }
        }

        let image_source = if name == "img" {
            let index = self.image_index;
            self.image_index += 1;
            rewrites.image_sources.get(&index)
        } else {
            None
        };

        self.out.push('<');
        self.out.push_str(name);
        for (attr, attr_value) in value.attrs.iter() {
            let attr_value = match image_source {
                Some(source) if attr.prefix.is_none() && &*attr.local == "src" => source.as_str(),
                _ => &**attr_value,
            };
            self.out.push(' ');
            // Foreign content keeps its prefixes (`xlink:href`, `xmlns:xlink`)
            if let Some(prefix) = &attr.prefix {
                self.out.push_str(prefix);
                self.out.push(':');
            }
            self.out.push_str(&attr.local);
            self.out.push_str("=\"");
            escape_attribute(attr_value, &mut self.out);
            self.out.push('"');
        }
        self.out.push('>');

        if VOID_ELEMENTS.contains(&name) {
            return;
        }

        let raw_text = RAW_TEXT_ELEMENTS.contains(&name);
        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    if raw_text {
                        self.out.push_str(text);
                    } else {
                        escape_text(text, &mut self.out);
                    }
                }
                Node::Comment(comment) => {
                    self.out.push_str("<!--");
                    self.out.push_str(comment);
                    self.out.push_str("-->");
                }
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.element(child);
                    }
                }
                _ => {}
            }
        }

        if name == "head" && !self.head_done {
            self.head_done = true;
            for css in &rewrites.head_styles {
                self.out.push_str("<style>");
                self.out.push_str(css);
                self.out.push_str("</style>");
            }
        }

        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}
