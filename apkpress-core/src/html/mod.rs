//! Span-preserving HTML fragment model.
//!
//! The tree is only used to locate things; edits are applied by splicing byte
//! ranges of the original source so untouched markup survives verbatim.

pub mod tokenizer;

use std::ops::Range;

use crate::error::HtmlError;
pub use tokenizer::{decode_entities, tokenize, Attribute, Token};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose text must never be rewritten.
const OPAQUE_ELEMENTS: &[&str] = &[
    "a", "script", "style", "textarea", "title", "noscript", "template", "code", "pre", "iframe",
    "xmp",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(Range<usize>),
    Comment(Range<usize>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<Attribute>,
    /// Span of the start tag.
    pub open: Range<usize>,
    /// Span of the end tag, if the source has one.
    pub close: Option<Range<usize>>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.value.as_deref())
    }

    /// Decoded text of every descendant text node, comments excluded.
    pub fn text(&self, source: &str) -> String {
        let mut out = String::new();
        collect_text(&self.children, source, &mut out);
        out
    }
}

#[derive(Debug, Clone)]
pub struct Fragment<'a> {
    source: &'a str,
    nodes: Vec<Node>,
}

impl<'a> Fragment<'a> {
    pub fn parse(source: &'a str) -> Result<Self, HtmlError> {
        let tokens = tokenize(source)?;
        Ok(Self {
            source,
            nodes: build_tree(tokens),
        })
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Text node spans that may be rewritten, in document order.
    pub fn text_slots(&self) -> Vec<Range<usize>> {
        let mut out = Vec::new();
        collect_text_slots(&self.nodes, &mut out);
        out
    }

    /// Every element named `name`, in document order.
    pub fn elements(&self, name: &str) -> Vec<&Element> {
        let mut out = Vec::new();
        collect_elements(&self.nodes, name, &mut out);
        out
    }
}

fn build_tree(tokens: Vec<Token>) -> Vec<Node> {
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    fn attach(root: &mut Vec<Node>, stack: &mut [Element], node: Node) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => root.push(node),
        }
    }

    for token in tokens {
        match token {
            Token::Text(r) => attach(&mut root, &mut stack, Node::Text(r)),
            Token::Comment(r) => attach(&mut root, &mut stack, Node::Comment(r)),
            Token::StartTag {
                name,
                attrs,
                self_closing,
                span,
            } => {
                let leaf = self_closing || VOID_ELEMENTS.contains(&name.as_str());
                let element = Element {
                    name,
                    attrs,
                    open: span,
                    close: None,
                    children: Vec::new(),
                };
                if leaf {
                    attach(&mut root, &mut stack, Node::Element(element));
                } else {
                    stack.push(element);
                }
            }
            Token::EndTag { name, span } => {
                // Stray end tags have no element to close and are left out of the tree.
                let Some(idx) = stack.iter().rposition(|e| e.name == name) else {
                    continue;
                };
                while stack.len() > idx + 1 {
                    if let Some(unclosed) = stack.pop() {
                        attach(&mut root, &mut stack, Node::Element(unclosed));
                    }
                }
                if let Some(mut element) = stack.pop() {
                    element.close = Some(span);
                    attach(&mut root, &mut stack, Node::Element(element));
                }
            }
        }
    }

    while let Some(unclosed) = stack.pop() {
        attach(&mut root, &mut stack, Node::Element(unclosed));
    }
    root
}

fn collect_text_slots(nodes: &[Node], out: &mut Vec<Range<usize>>) {
    for node in nodes {
        match node {
            Node::Text(r) => out.push(r.clone()),
            Node::Element(e) if !OPAQUE_ELEMENTS.contains(&e.name.as_str()) => {
                collect_text_slots(&e.children, out)
            }
            _ => {}
        }
    }
}

fn collect_text(nodes: &[Node], source: &str, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(r) => out.push_str(&decode_entities(&source[r.clone()])),
            Node::Element(e) => collect_text(&e.children, source, out),
            Node::Comment(_) => {}
        }
    }
}

fn collect_elements<'n>(nodes: &'n [Node], name: &str, out: &mut Vec<&'n Element>) {
    for node in nodes {
        if let Node::Element(e) = node {
            if e.name == name {
                out.push(e);
            }
            collect_elements(&e.children, name, out);
        }
    }
}

/// Replace non-overlapping byte ranges of `source`.
pub fn splice(source: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(r, _)| r.start);
    let mut out = String::with_capacity(source.len() + 64);
    let mut cursor = 0;
    for (range, replacement) in edits {
        if range.start < cursor {
            continue;
        }
        out.push_str(&source[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Escape text for use inside a double-quoted attribute value.
pub fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
