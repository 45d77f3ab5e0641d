//! HTML fragment parsing
//!
//! Editor HTML is run through the html5ever tree builder into an `RcDom`
//! and copied into a small owned tree the Markdown writer can reshape.
//! Parsing never fails: the HTML5 algorithm repairs unclosed paragraphs,
//! list items and table cells and drops unmatched close tags.

use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, serialize, serialize::SerializeOpts, serialize::TraversalScope, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

use crate::error::{InkbridgeError, Result};

/// Elements rendered as blocks when serializing
pub const BLOCK_ELEMENTS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "dd",
    "div",
    "dl",
    "dt",
    "figcaption",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
];

/// A parsed HTML node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Text with entities decoded
    Text(String),
}

/// A parsed HTML element
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Lowercased tag name
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    /// Get an attribute value by (lowercase) name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_block(&self) -> bool {
        is_block(&self.name)
    }

    /// Concatenated text content of all descendants
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        collect_text(&self.children, &mut text);
        text
    }

    /// Number of characters of visible text, ignoring whitespace-only nodes
    pub fn text_len(&self) -> usize {
        text_len(&self.children)
    }
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    pub fn is_whitespace(&self) -> bool {
        matches!(self, Node::Text(text) if text.chars().all(|c| c.is_ascii_whitespace()))
    }
}

pub fn is_block(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => collect_text(&element.children, out),
        }
    }
}

fn text_len(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            Node::Text(text) if text.chars().all(|c| c.is_ascii_whitespace()) => 0,
            Node::Text(text) => text.chars().count(),
            Node::Element(element) => text_len(&element.children),
        })
        .sum()
}

/// Parse editor HTML as the body of a document.
///
/// The returned `RcDom` owns the tree; handles taken from it must not
/// outlive it, because dropping the dom detaches every child list.
fn parse_body(html: &str) -> (RcDom, Option<Handle>) {
    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
    let body = find_element(&dom.document, "body");
    (dom, body)
}

fn find_element(handle: &Handle, name: &str) -> Option<Handle> {
    for child in handle.children.borrow().iter() {
        if let NodeData::Element { name: qual, .. } = &child.data {
            if &*qual.local == name {
                return Some(child.clone());
            }
            if let Some(found) = find_element(child, name) {
                return Some(found);
            }
        }
    }
    None
}

/// Copy an rcdom node into the owned tree; comments and doctypes are dropped
fn to_node(handle: &Handle) -> Option<Node> {
    match &handle.data {
        NodeData::Text { contents } => Some(Node::Text(contents.borrow().to_string())),
        NodeData::Element { name, attrs, .. } => Some(Node::Element(Element {
            name: name.local.to_string(),
            attrs: attrs
                .borrow()
                .iter()
                .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                .collect(),
            children: to_nodes(handle),
        })),
        _ => None,
    }
}

fn to_nodes(handle: &Handle) -> Vec<Node> {
    handle.children.borrow().iter().filter_map(to_node).collect()
}

/// Parse an HTML fragment into its top-level nodes
pub fn parse_fragment(html: &str) -> Vec<Node> {
    let (_dom, body) = parse_body(html);
    body.as_ref().map(to_nodes).unwrap_or_default()
}

/// Re-serialize one node, including its own tag
fn outer_html(handle: &Handle) -> Result<String> {
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };
    let mut output = Vec::new();
    serialize(&mut output, &SerializableHandle::from(handle.clone()), opts)?;

    String::from_utf8(output)
        .map_err(|e| InkbridgeError::conversion_anomaly(format!("serialized HTML is not UTF-8: {}", e)))
}

/// Top-level node of a fragment, serialized back to HTML
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopLevelBlock {
    pub html: String,
    /// Visible text length; zero for stray top-level text
    pub text_len: usize,
    pub is_element: bool,
}

/// List every top-level node of a fragment in document order.
///
/// Concatenating the `html` of all blocks gives the normalized fragment.
/// Only element blocks can be insertion points.
pub fn top_level_blocks(html: &str) -> Result<Vec<TopLevelBlock>> {
    let (_dom, body) = parse_body(html);
    let Some(body) = body else {
        return Ok(Vec::new());
    };

    let children = body.children.borrow();
    let mut blocks = Vec::with_capacity(children.len());
    for child in children.iter() {
        let Some(node) = to_node(child) else {
            continue;
        };
        let (text_len, is_element) = match &node {
            Node::Element(element) => (element.text_len(), true),
            Node::Text(_) => (0, false),
        };
        blocks.push(TopLevelBlock {
            html: outer_html(child)?,
            text_len,
            is_element,
        });
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &Node) -> &Element {
        node.as_element().expect("expected element")
    }

    #[test]
    fn test_parses_nested_inline() {
        let nodes = parse_fragment("<p>Hello <strong>bold &amp; brave</strong></p>");
        assert_eq!(nodes.len(), 1);

        let p = element(&nodes[0]);
        assert_eq!(p.name, "p");
        assert_eq!(p.text_content(), "Hello bold & brave");
        assert_eq!(element(&p.children[1]).name, "strong");
    }

    #[test]
    fn test_attributes_and_void_elements() {
        let nodes = parse_fragment(
            r#"<p><img src="a.png?x=1&amp;y=2" alt='Cat'><br>after</p>"#,
        );
        let p = element(&nodes[0]);
        let img = element(&p.children[0]);
        assert_eq!(img.attr("src"), Some("a.png?x=1&y=2"));
        assert_eq!(img.attr("alt"), Some("Cat"));
        assert!(img.children.is_empty());
        assert_eq!(element(&p.children[1]).name, "br");
        assert_eq!(p.children[2], Node::Text("after".to_string()));
    }

    #[test]
    fn test_block_closes_open_paragraph() {
        let nodes = parse_fragment("<p>Intro</p><p><ul><li>one</li></ul>");
        let names: Vec<&str> = nodes
            .iter()
            .filter_map(Node::as_element)
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["p", "p", "ul"]);
    }

    #[test]
    fn test_implicit_list_item_close() {
        let nodes = parse_fragment("<ul><li>one<li>two<ul><li>nested</ul></ul>");
        let ul = element(&nodes[0]);
        assert_eq!(ul.children.len(), 2);
        let second = element(&ul.children[1]);
        assert_eq!(second.text_content(), "twonested");
    }

    #[test]
    fn test_stray_markup_is_tolerated() {
        let nodes = parse_fragment("a < b</em> <!-- note --> c");
        assert!(nodes.iter().all(|n| matches!(n, Node::Text(_))));
        let text: String = nodes
            .iter()
            .map(|n| match n {
                Node::Text(t) => t.clone(),
                Node::Element(_) => String::new(),
            })
            .collect();
        assert_eq!(text, "a < b  c");
    }

    #[test]
    fn test_table_rows_get_a_body() {
        let nodes = parse_fragment("<table><tr><td>1</td></tr></table>");
        let table = element(&nodes[0]);
        assert_eq!(element(&table.children[0]).name, "tbody");
    }

    #[test]
    fn test_top_level_blocks() {
        let html = "<p>Hello</p>\n<h1>Title!</h1><p><br></p>";
        let blocks = top_level_blocks(html).unwrap();

        let summary: Vec<(&str, usize, bool)> = blocks
            .iter()
            .map(|b| (b.html.as_str(), b.text_len, b.is_element))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("<p>Hello</p>", 5, true),
                ("\n", 0, false),
                ("<h1>Title!</h1>", 6, true),
                ("<p><br></p>", 0, true),
            ]
        );
    }

    #[test]
    fn test_top_level_blocks_reserialize_entities() {
        let blocks = top_level_blocks("<p>a &amp; b</p>").unwrap();
        assert_eq!(blocks[0].html, "<p>a &amp; b</p>");
        assert_eq!(blocks[0].text_len, 5);
    }
}
