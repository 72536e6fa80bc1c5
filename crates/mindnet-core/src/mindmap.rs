//! Indented mindmap text ↔ node tree.
//!
//! ```text
//! mindmap
//!   root((bug parser))
//!     bug
//!       ::icon(fa fa-bug)
//!     parser
//! ```
//!
//! The first non-blank line is the `mindmap` header, followed by exactly one
//! root line and child lines indented deeper than their parent. A node line
//! may use a shape such as `id((text))` or `id[text]`; only the text is kept.
//! `::icon(name)` lines annotate the node above them.

use crate::error::ParseError;
use crate::node::normalize_key;
use serde::{Deserialize, Serialize};

const HEADER: &str = "mindmap";
const ICON_PREFIX: &str = "::icon(";
const TAB_WIDTH: usize = 4;

/// Shape delimiters, checked in this order.
const SHAPES: &[(&str, &str)] = &[
    ("((", "))"),
    ("))", "(("),
    ("{{", "}}"),
    ("(", ")"),
    ("[", "]"),
    (")", "("),
];

/// One node of a parsed mindmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindmapNode {
    pub name: String,
    #[serde(default)]
    pub children: Vec<MindmapNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl MindmapNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            icon: None,
        }
    }

    pub fn with_child(mut self, child: MindmapNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Total number of nodes in this subtree.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(MindmapNode::node_count).sum::<usize>()
    }

    /// Every parent → child pair in depth-first order.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        self.collect_edges(&mut out);
        out
    }

    fn collect_edges<'a>(&'a self, out: &mut Vec<(&'a str, &'a str)>) {
        for child in &self.children {
            out.push((self.name.as_str(), child.name.as_str()));
            child.collect_edges(out);
        }
    }

    /// Every node name in depth-first order.
    pub fn names(&self) -> Vec<&str> {
        let mut out = vec![self.name.as_str()];
        for child in &self.children {
            out.extend(child.names());
        }
        out
    }

    fn same_node(&self, other: &MindmapNode) -> bool {
        normalize_key(&self.name) == normalize_key(&other.name)
    }
}

/// Options for [`serialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeOptions {
    pub indent_size: usize,
    pub include_icons: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            indent_size: 2,
            include_icons: true,
        }
    }
}

/// Result of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ParseError>,
}

/// Parse mindmap text, failing on the first grammar violation.
pub fn parse(text: &str) -> Result<MindmapNode, ParseError> {
    let (tree, mut errors) = scan(text);
    if !errors.is_empty() {
        return Err(errors.swap_remove(0));
    }
    tree.ok_or_else(|| ParseError::new(0, "", "no root node"))
}

/// Check mindmap text and report every violation without failing.
pub fn validate(text: &str) -> ValidationReport {
    let (_, errors) = scan(text);
    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

/// Render a tree as mindmap text.
pub fn serialize(tree: &MindmapNode, options: &SerializeOptions) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    write_node(&mut out, tree, 1, true, options);
    out
}

/// Combine two mindmap texts by node name, so re-appending the same content
/// never duplicates a node.
pub fn merge(existing: &str, incoming: &str) -> Result<String, ParseError> {
    let options = SerializeOptions::default();
    if existing.trim().is_empty() {
        return Ok(serialize(&parse(incoming)?, &options));
    }
    let mut base = parse(existing)?;
    if !incoming.trim().is_empty() {
        merge_trees(&mut base, parse(incoming)?);
    }
    Ok(serialize(&base, &options))
}

/// Tree-level merge used by [`merge`]. A differently named incoming root
/// lands as a child of the existing root.
pub fn merge_trees(base: &mut MindmapNode, incoming: MindmapNode) {
    if base.same_node(&incoming) {
        absorb(base, incoming);
    } else {
        absorb_child(base, incoming);
    }
}

fn absorb(into: &mut MindmapNode, from: MindmapNode) {
    if into.icon.is_none() {
        into.icon = from.icon;
    }
    for child in from.children {
        absorb_child(into, child);
    }
}

fn absorb_child(parent: &mut MindmapNode, child: MindmapNode) {
    if let Some(existing) = parent.children.iter_mut().find(|c| c.same_node(&child)) {
        absorb(existing, child);
    } else {
        let mut fresh = MindmapNode::new(child.name.clone());
        absorb(&mut fresh, child);
        parent.children.push(fresh);
    }
}

/// Build the mindmap for a keyword list: the joined keywords as root and one
/// child per keyword. Returns an empty string when no keyword survives.
pub fn keywords_mindmap(keywords: &[String]) -> String {
    let mut seen = Vec::new();
    for keyword in keywords {
        if let Some(key) = normalize_key(keyword) {
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
    }
    if seen.is_empty() {
        return String::new();
    }
    let root = seen
        .iter()
        .fold(MindmapNode::new(seen.join(" ")), |root, key| {
            root.with_child(MindmapNode::new(key.clone()))
        });
    serialize(&root, &SerializeOptions::default())
}

// ── Reading ─────────────────────────────────────────────────────

struct FlatNode {
    name: String,
    icon: Option<String>,
    children: Vec<usize>,
}

fn scan(text: &str) -> (Option<MindmapNode>, Vec<ParseError>) {
    let mut errors = Vec::new();
    let mut header_seen = false;
    let mut nodes: Vec<FlatNode> = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let mut root_indent: Option<usize> = None;
    let mut last: Option<usize> = None;

    for (idx, line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("%%") {
            continue;
        }
        if !header_seen {
            header_seen = true;
            if trimmed == HEADER {
                continue;
            }
            errors.push(ParseError::new(lineno, line, "expected `mindmap` header"));
        }

        if let Some(rest) = trimmed.strip_prefix(ICON_PREFIX) {
            match (rest.strip_suffix(')').map(str::trim), last) {
                (None, _) => errors.push(ParseError::new(lineno, line, "unterminated icon")),
                (Some(""), _) => errors.push(ParseError::new(lineno, line, "empty icon")),
                (Some(_), None) => {
                    errors.push(ParseError::new(lineno, line, "icon before any node"))
                }
                (Some(icon), Some(node)) => nodes[node].icon = Some(icon.to_string()),
            }
            continue;
        }
        if trimmed.starts_with(":::") {
            // Class annotations carry no structure.
            continue;
        }
        if trimmed.starts_with("::") {
            errors.push(ParseError::new(lineno, line, "unknown annotation"));
            continue;
        }

        let name = match node_text(trimmed) {
            Some(name) if !name.is_empty() => name,
            _ => {
                errors.push(ParseError::new(lineno, line, "empty node text"));
                continue;
            }
        };

        let indent = indent_width(line);
        let id = nodes.len();
        match root_indent {
            None => {
                root_indent = Some(indent);
                stack.push((indent, id));
            }
            Some(root) if indent <= root => {
                let message = if indent == root {
                    "second root node"
                } else {
                    "indented less than the root"
                };
                errors.push(ParseError::new(lineno, line, message));
                continue;
            }
            Some(_) => {
                while stack.last().is_some_and(|&(depth, _)| depth >= indent) {
                    stack.pop();
                }
                if let Some(&(_, parent)) = stack.last() {
                    nodes[parent].children.push(id);
                }
                stack.push((indent, id));
            }
        }
        nodes.push(FlatNode {
            name,
            icon: None,
            children: Vec::new(),
        });
        last = Some(id);
    }

    if !header_seen {
        errors.push(ParseError::new(0, "", "missing `mindmap` header"));
    } else if nodes.is_empty() {
        errors.push(ParseError::new(0, "", "no root node"));
    }

    let tree = if nodes.is_empty() {
        None
    } else {
        Some(assemble(&mut nodes, 0))
    };
    (tree, errors)
}

fn assemble(nodes: &mut [FlatNode], id: usize) -> MindmapNode {
    let children = std::mem::take(&mut nodes[id].children);
    MindmapNode {
        name: std::mem::take(&mut nodes[id].name),
        icon: nodes[id].icon.take(),
        children: children
            .into_iter()
            .map(|child| assemble(nodes, child))
            .collect(),
    }
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

/// Extract the display text of a node line, stripping any shape.
fn node_text(trimmed: &str) -> Option<String> {
    for (open, close) in SHAPES {
        let Some(pos) = trimmed.find(open) else {
            continue;
        };
        let id = &trimmed[..pos];
        if id.chars().any(char::is_whitespace)
            || !trimmed.ends_with(close)
            || trimmed.len() < pos + open.len() + close.len()
        {
            continue;
        }
        let inner = trimmed[pos + open.len()..trimmed.len() - close.len()].trim();
        let inner = inner
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(inner);
        return Some(inner.trim().to_string());
    }
    Some(trimmed.to_string())
}

// ── Writing ─────────────────────────────────────────────────────

fn write_node(
    out: &mut String,
    node: &MindmapNode,
    depth: usize,
    is_root: bool,
    options: &SerializeOptions,
) {
    let pad = " ".repeat(options.indent_size.max(1) * depth);
    let label = if is_root {
        shaped_label("root", &node.name)
    } else if reads_back(&node.name, &node.name)
        && !node.name.starts_with("::")
        && !node.name.starts_with("%%")
    {
        node.name.clone()
    } else {
        shaped_label("n", &node.name)
    };
    out.push_str(&pad);
    out.push_str(&label);
    out.push('\n');

    if options.include_icons {
        if let Some(icon) = &node.icon {
            out.push_str(&" ".repeat(options.indent_size.max(1) * (depth + 1)));
            out.push_str(ICON_PREFIX);
            out.push_str(icon);
            out.push_str(")\n");
        }
    }
    for child in &node.children {
        write_node(out, child, depth + 1, false, options);
    }
}

fn shaped_label(id: &str, name: &str) -> String {
    for (open, close) in [("((", "))"), ("[", "]"), ("{{", "}}")] {
        let label = format!("{id}{open}{name}{close}");
        if reads_back(&label, name) {
            return label;
        }
    }
    format!("{id}[\"{name}\"]")
}

fn reads_back(label: &str, name: &str) -> bool {
    node_text(label.trim()).as_deref() == Some(name.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "mindmap
  root((Bug Parser))
    bug
      ::icon(fa fa-bug)
      regression
    parser
";

    #[test]
    fn parses_tree_and_icon() {
        let tree = parse(SAMPLE).unwrap();
        assert_eq!(tree.name, "Bug Parser");
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].name, "bug");
        assert_eq!(tree.children[0].icon.as_deref(), Some("fa fa-bug"));
        assert_eq!(tree.children[0].children[0].name, "regression");
        assert_eq!(tree.children[1].name, "parser");
    }

    #[test]
    fn strips_shapes() {
        let text = "mindmap\n  root((center))\n    a[square]\n    b(rounded)\n    c{{hex}}\n    d))bang((\n    plain (with note)\n";
        let tree = parse(text).unwrap();
        assert_eq!(
            tree.names(),
            vec!["center", "square", "rounded", "hex", "bang", "plain (with note)"]
        );
    }

    #[test]
    fn roundtrip_preserves_structure() {
        let tree = parse(SAMPLE).unwrap();
        let text = serialize(&tree, &SerializeOptions { indent_size: 4, include_icons: true });
        let again = parse(&text).unwrap();
        assert_eq!(again, tree);
    }

    #[test]
    fn serialize_can_drop_icons() {
        let tree = parse(SAMPLE).unwrap();
        let text = serialize(&tree, &SerializeOptions { indent_size: 2, include_icons: false });
        assert!(!text.contains("::icon"));
        assert_eq!(parse(&text).unwrap().edges(), tree.edges());
    }

    #[test]
    fn awkward_names_survive_roundtrip() {
        let tree = MindmapNode::new("fix (urgent)")
            .with_child(MindmapNode::new("(paren)"))
            .with_child(MindmapNode::new("::not-an-icon"))
            .with_child(MindmapNode::new("%%note").with_child(MindmapNode::new("kid")));
        let again = parse(&serialize(&tree, &SerializeOptions::default())).unwrap();
        assert_eq!(again.names(), tree.names());
        assert_eq!(again.edges(), tree.edges());
    }

    #[test]
    fn comment_like_text_keeps_its_children() {
        let tree = parse("mindmap\n  root((r))\n    a[%%note]\n      kid\n").unwrap();
        assert_eq!(tree.edges(), vec![("r", "%%note"), ("%%note", "kid")]);
        let again = parse(&serialize(&tree, &SerializeOptions::default())).unwrap();
        assert_eq!(again.edges(), tree.edges());
    }

    #[test]
    fn tabs_count_as_indentation() {
        let text = "mindmap\n\troot\n\t\tchild\n\t\t\tgrandchild\n";
        let tree = parse(text).unwrap();
        assert_eq!(tree.edges(), vec![("root", "child"), ("child", "grandchild")]);
    }

    #[test]
    fn missing_header_is_an_error() {
        let err = parse("root\n  child\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.fragment, "root");
    }

    #[test]
    fn second_root_is_an_error() {
        let err = parse("mindmap\n  a\n  b\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("second root"));
    }

    #[test]
    fn validate_collects_all_errors() {
        let report = validate("mindmap\n  ::icon(x)\n  root\n  other\n root()\n    ::icon(\n");
        assert!(!report.valid);
        let lines: Vec<usize> = report.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![2, 4, 5, 6]);
    }

    #[test]
    fn validate_accepts_good_text() {
        let report = validate(SAMPLE);
        assert!(report.valid);
        assert!(report.errors.is_empty());
        assert!(!validate("").valid);
        assert!(!validate("mindmap\n").valid);
    }

    #[test]
    fn merge_unions_by_name() {
        let incoming = "mindmap\n  root((bug parser))\n    parser\n      lexer\n    tokenizer\n";
        let merged = merge(SAMPLE, incoming).unwrap();
        let tree = parse(&merged).unwrap();
        assert_eq!(
            tree.names(),
            vec!["Bug Parser", "bug", "regression", "parser", "lexer", "tokenizer"]
        );
    }

    #[test]
    fn repeated_merge_is_idempotent() {
        let once = merge(SAMPLE, SAMPLE).unwrap();
        let twice = merge(&once, SAMPLE).unwrap();
        assert_eq!(once, twice);
        assert_eq!(parse(&twice).unwrap().node_count(), 4);
    }

    #[test]
    fn merge_foreign_root_becomes_child() {
        let merged = merge(SAMPLE, "mindmap\n  release\n    notes\n").unwrap();
        let tree = parse(&merged).unwrap();
        assert_eq!(tree.children.last().unwrap().name, "release");
        assert_eq!(tree.children.last().unwrap().children[0].name, "notes");
    }

    #[test]
    fn merge_into_blank_returns_incoming() {
        let merged = merge("  \n", SAMPLE).unwrap();
        assert_eq!(parse(&merged).unwrap(), parse(SAMPLE).unwrap());
        assert!(merge("not a mindmap", SAMPLE).is_err());
    }

    #[test]
    fn keyword_mindmap_shape() {
        let text = keywords_mindmap(&["Bug".to_string(), "parser".to_string(), "bug".to_string()]);
        let tree = parse(&text).unwrap();
        assert_eq!(tree.name, "bug parser");
        assert_eq!(tree.names(), vec!["bug parser", "bug", "parser"]);
        assert!(keywords_mindmap(&[]).is_empty());
    }
}
