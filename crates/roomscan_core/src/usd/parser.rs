//! USDA (ASCII) structural parser.
//!
//! Line-oriented and grammar-agnostic: the parser records nested scopes
//! in a [`PropertyNode`] tree and leaves all interpretation to later stages.
//!
//! # Handled Lines
//!
//! - `key = value` assignments (`{`, `(` and `[` openers at the end of the value)
//! - `def Mesh "Name"` / `over` / `class` headers, optionally followed by
//!   `(` metadata and/or `{` on the same or a later line
//! - `{` / `}` / `(` / `)` scope delimiters
//! - multi-line arrays (`[` ... `]`), kept as raw text
//!
//! Malformed input never aborts the parse. Unbalanced closers and arrays
//! that never terminate are reported as diagnostics. Scopes nested deeper
//! than [`MAX_SCOPE_DEPTH`] are folded into the innermost kept scope, so the
//! tree (and its recursive drop) stays shallow.

use crate::diagnostics::{Diagnostic, Diagnostics};

use super::types::{PropertyNode, PropertyValue};

/// Deepest scope nesting kept in the tree.
pub const MAX_SCOPE_DEPTH: usize = 512;

/// Where a finished scope is stored when it is closed.
#[derive(Debug)]
enum FrameKey {
    Root,
    /// Nested node under this raw key of the parent
    Child(String),
    /// Metadata side table entry of the parent (empty key: layer metadata)
    Metadata(String),
}

impl FrameKey {
    fn raw_key(&self) -> &str {
        match self {
            FrameKey::Root => "",
            FrameKey::Child(key) | FrameKey::Metadata(key) => key,
        }
    }
}

#[derive(Debug)]
struct Frame {
    key: FrameKey,
    node: PropertyNode,
}

/// Array literal spanning several lines.
#[derive(Debug)]
struct PendingArray {
    key: String,
    buffer: String,
}

/// USDA structural parser.
pub struct UsdaParser<'a> {
    content: &'a str,
    stack: Vec<Frame>,
    pending_name: Option<String>,
    array: Option<PendingArray>,
    /// Openers past the depth limit whose closers are still outstanding
    folded: usize,
}

impl<'a> UsdaParser<'a> {
    /// Create a new parser over file contents.
    pub fn new(content: &'a str) -> Self {
        Self {
            content: content.trim_start_matches('\u{feff}'),
            stack: vec![Frame {
                key: FrameKey::Root,
                node: PropertyNode::new(),
            }],
            pending_name: None,
            array: None,
            folded: 0,
        }
    }

    /// Parse the whole content into a property tree.
    pub fn parse(mut self, diagnostics: &mut Diagnostics) -> PropertyNode {
        for (index, raw_line) in self.content.lines().enumerate() {
            self.parse_line(index + 1, raw_line, diagnostics);
        }
        self.finish(diagnostics)
    }

    fn parse_line(&mut self, line_no: usize, raw_line: &str, diagnostics: &mut Diagnostics) {
        // Array accumulation takes priority over everything else
        if let Some(array) = self.array.as_mut() {
            array.buffer.push(' ');
            array.buffer.push_str(raw_line.trim());
            if raw_line.trim_end().ends_with(']') {
                if let Some(array) = self.array.take() {
                    self.current()
                        .insert(&array.key, PropertyValue::Array(array.buffer));
                }
            }
            return;
        }

        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            return;
        }

        if is_prim_header(line) {
            self.parse_prim_header(line, diagnostics);
        } else if let Some((lhs, rhs)) = line.split_once('=') {
            self.parse_assignment(lhs.trim(), rhs.trim(), diagnostics);
        } else if let Some(head) = line.strip_suffix('{') {
            let key = self.scope_key(head);
            self.push(FrameKey::Child(key), diagnostics);
        } else if line.ends_with('}') {
            self.pop(line_no, diagnostics);
        } else if let Some(head) = line.strip_suffix('(') {
            let head = head.trim();
            if head.is_empty() && self.pending_name.is_none() && self.stack.len() == 1 {
                self.push(FrameKey::Metadata(String::new()), diagnostics);
            } else {
                let key = self.scope_key(head);
                self.push(FrameKey::Child(key), diagnostics);
            }
        } else if line.ends_with(')') {
            self.pop(line_no, diagnostics);
        } else {
            self.pending_name = Some(line.to_string());
        }
    }

    fn parse_assignment(&mut self, key: &str, value: &str, diagnostics: &mut Diagnostics) {
        if let Some(head) = value.strip_suffix('{') {
            let head = head.trim();
            if !head.is_empty() {
                self.current()
                    .insert(key, PropertyValue::Scalar(head.to_string()));
            }
            self.push(FrameKey::Child(key.to_string()), diagnostics);
        } else if let Some(head) = value.strip_suffix('(') {
            self.current()
                .insert(key, PropertyValue::Scalar(head.trim().to_string()));
            self.push(FrameKey::Metadata(key.to_string()), diagnostics);
        } else if value.ends_with('[') && !value.contains(']') {
            self.array = Some(PendingArray {
                key: key.to_string(),
                buffer: value.to_string(),
            });
        } else {
            let stored = if value.starts_with('[') {
                PropertyValue::Array(value.to_string())
            } else {
                PropertyValue::Scalar(value.to_string())
            };
            self.current().insert(key, stored);
        }
    }

    /// `def Xform "Door" (prepend references = @door.usda@) {`
    fn parse_prim_header(&mut self, line: &str, diagnostics: &mut Diagnostics) {
        let name_end = line
            .find('"')
            .and_then(|open| line[open + 1..].find('"').map(|len| open + len + 2))
            .unwrap_or(line.len());
        let name = line[..name_end].trim().to_string();
        let rest = line[name_end..].trim();

        // Inline metadata: `( key = value )`
        if let (Some(open), Some(close)) = (rest.find('('), rest.rfind(')')) {
            if open < close {
                let mut node = self.current().take_node(&name);
                if let Some((lhs, rhs)) = rest[open + 1..close].split_once('=') {
                    node.insert(lhs.trim(), PropertyValue::Scalar(rhs.trim().to_string()));
                }
                self.current().insert(&name, PropertyValue::Node(node));
            }
        }

        // Inline body: `{ key = value; key = value }`
        if let (Some(open), true) = (rest.find('{'), rest.ends_with('}')) {
            let mut node = self.current().take_node(&name);
            for statement in rest[open + 1..rest.len() - 1].split(';') {
                if let Some((lhs, rhs)) = statement.split_once('=') {
                    node.insert(lhs.trim(), PropertyValue::Scalar(rhs.trim().to_string()));
                }
            }
            self.current().insert(&name, PropertyValue::Node(node));
            self.pending_name = Some(name);
            return;
        }

        self.pending_name = Some(name.clone());
        if rest.ends_with('{') || rest.ends_with('(') {
            self.push(FrameKey::Child(name), diagnostics);
        }
    }

    /// Key for a scope opened by a bare `{` or `(`: text before it, or the pending name.
    fn scope_key(&self, head: &str) -> String {
        let head = head.trim();
        if head.is_empty() {
            self.pending_name.clone().unwrap_or_default()
        } else {
            head.to_string()
        }
    }

    fn current(&mut self) -> &mut PropertyNode {
        let last = self.stack.len() - 1;
        &mut self.stack[last].node
    }

    /// Open a scope. Child scopes reopen (and merge into) an existing node.
    fn push(&mut self, key: FrameKey, diagnostics: &mut Diagnostics) {
        if self.stack.len() > MAX_SCOPE_DEPTH {
            if self.folded == 0 {
                diagnostics.push(Diagnostic::DepthLimit {
                    prim: key.raw_key().to_string(),
                    limit: MAX_SCOPE_DEPTH,
                });
            }
            self.folded += 1;
            return;
        }

        let node = match &key {
            FrameKey::Child(raw) => self.current().take_node(raw),
            _ => PropertyNode::new(),
        };
        self.stack.push(Frame { key, node });
    }

    fn pop(&mut self, line_no: usize, diagnostics: &mut Diagnostics) {
        if self.folded > 0 {
            self.folded -= 1;
            return;
        }
        if self.stack.len() <= 1 {
            diagnostics.push(Diagnostic::StructuralImbalance { line: line_no });
            return;
        }
        if let Some(frame) = self.stack.pop() {
            self.attach(frame);
        }
    }

    fn attach(&mut self, frame: Frame) {
        let parent = self.current();
        match frame.key {
            FrameKey::Child(key) => parent.insert(&key, PropertyValue::Node(frame.node)),
            FrameKey::Metadata(key) => parent.set_metadata(&key, frame.node),
            FrameKey::Root => {}
        }
    }

    fn finish(mut self, diagnostics: &mut Diagnostics) -> PropertyNode {
        if let Some(array) = self.array.take() {
            diagnostics.push(Diagnostic::UnterminatedArray { key: array.key });
        }

        if self.stack.len() > 1 {
            log::debug!("Folding {} unclosed scope(s) at end of input", self.stack.len() - 1);
        }
        while self.stack.len() > 1 {
            if let Some(frame) = self.stack.pop() {
                self.attach(frame);
            }
        }

        self.stack
            .pop()
            .map(|frame| frame.node)
            .unwrap_or_default()
    }
}

fn is_prim_header(line: &str) -> bool {
    let first = line.split_whitespace().next().unwrap_or("");
    matches!(first, "def" | "over" | "class") && line.contains('"')
}

/// Parse USDA text into a property tree, collecting recovered problems.
pub fn parse_usda(content: &str, diagnostics: &mut Diagnostics) -> PropertyNode {
    UsdaParser::new(content).parse(diagnostics)
}
