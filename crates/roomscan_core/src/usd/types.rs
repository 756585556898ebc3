//! Generic property tree produced by the USDA text parser.
//!
//! The parser does not know USD semantics; it only records nested scopes.
//! Each raw key is classified once into a [`Key`] when it is inserted, and
//! every later component matches on that variant instead of re-inspecting
//! key prefixes.

use indexmap::IndexMap;

/// Prim specifier (`def`, `over`, `class`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Specifier {
    Def,
    Over,
    Class,
}

/// List-editing operation prefixed to a metadata key (`prepend references`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListOp {
    Add,
    Append,
    Prepend,
    Delete,
    Reorder,
}

impl ListOp {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "add" => Some(ListOp::Add),
            "append" => Some(ListOp::Append),
            "prepend" => Some(ListOp::Prepend),
            "delete" => Some(ListOp::Delete),
            "reorder" => Some(ListOp::Reorder),
            _ => None,
        }
    }

    /// Whether this operation contributes items (as opposed to removing or reordering).
    pub fn adds_items(self) -> bool {
        matches!(self, ListOp::Add | ListOp::Append | ListOp::Prepend)
    }
}

/// A raw property key classified into what it declares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Key {
    /// `def Mesh "Wall0"`
    Prim {
        specifier: Specifier,
        prim_type: Option<String>,
        name: String,
    },

    /// `float3 xformOp:translate`, `uniform token[] xformOpOrder`
    Attribute {
        type_name: String,
        name: String,
        uniform: bool,
    },

    /// `rel material:binding`
    Relationship { name: String },

    /// `references`, `prepend references`, `kind`, `upAxis`
    Metadata { list_op: Option<ListOp>, name: String },

    /// Anything else (free-form lines, unnamed scopes)
    Other(String),
}

impl Key {
    /// Classify a raw key string.
    pub fn classify(raw: &str) -> Key {
        let raw = raw.trim();
        let mut tokens = raw.split_whitespace();
        let Some(first) = tokens.next() else {
            return Key::Other(String::new());
        };

        let specifier = match first {
            "def" => Some(Specifier::Def),
            "over" => Some(Specifier::Over),
            "class" => Some(Specifier::Class),
            _ => None,
        };

        if let Some(specifier) = specifier {
            if let Some(name) = quoted(raw) {
                let head = &raw[first.len()..raw.find('"').unwrap_or(raw.len())];
                let prim_type = head.split_whitespace().next().map(str::to_string);
                return Key::Prim {
                    specifier,
                    prim_type,
                    name: name.to_string(),
                };
            }
        }

        if first == "rel" {
            return match tokens.next() {
                Some(name) => Key::Relationship {
                    name: name.to_string(),
                },
                None => Key::Other(raw.to_string()),
            };
        }

        let mut words: Vec<&str> = raw.split_whitespace().collect();
        let mut uniform = false;
        while let Some(&qualifier) = words.first() {
            match qualifier {
                "uniform" => {
                    uniform = true;
                    words.remove(0);
                }
                "custom" | "varying" => {
                    words.remove(0);
                }
                _ => break,
            }
        }

        match words.as_slice() {
            [name] => Key::Metadata {
                list_op: None,
                name: name.to_string(),
            },
            [op, name] if ListOp::from_token(op).is_some() => Key::Metadata {
                list_op: ListOp::from_token(op),
                name: name.to_string(),
            },
            [type_name, name] => Key::Attribute {
                type_name: type_name.to_string(),
                name: name.to_string(),
                uniform,
            },
            _ => Key::Other(raw.to_string()),
        }
    }

    /// Prim type and name when this key defines a prim with `def`.
    pub fn as_def(&self) -> Option<(&str, &str)> {
        match self {
            Key::Prim {
                specifier: Specifier::Def,
                prim_type,
                name,
            } => Some((prim_type.as_deref().unwrap_or(""), name.as_str())),
            _ => None,
        }
    }

    /// True for a prim of `prim_type` (any specifier).
    pub fn is_prim_of(&self, wanted: &str) -> bool {
        matches!(self, Key::Prim { prim_type: Some(t), .. } if t == wanted)
    }

    /// Prim name for any prim key.
    pub fn prim_name(&self) -> Option<&str> {
        match self {
            Key::Prim { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// First double-quoted substring of `text`.
fn quoted(text: &str) -> Option<&str> {
    let start = text.find('"')? + 1;
    let len = text[start..].find('"')?;
    Some(&text[start..start + len])
}

/// Value stored under a key.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// Single-line value text, trimmed
    Scalar(String),

    /// Raw array literal text (`[...]`), possibly accumulated over many lines
    Array(String),

    /// Nested scope
    Node(PropertyNode),
}

impl PropertyValue {
    /// Raw text for scalar and array values.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Scalar(text) | PropertyValue::Array(text) => Some(text),
            PropertyValue::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&PropertyNode> {
        match self {
            PropertyValue::Node(node) => Some(node),
            _ => None,
        }
    }
}

/// A classified key together with its value.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub key: Key,
    pub value: PropertyValue,
}

/// A prim definition found among a node's entries.
#[derive(Clone, Copy, Debug)]
pub struct PrimRef<'a> {
    pub prim_type: &'a str,
    pub name: &'a str,
    pub node: &'a PropertyNode,
}

/// Insertion-ordered mapping from raw key to value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyNode {
    entries: IndexMap<String, Entry>,
    /// Metadata scopes attached to an attribute (`asset inputs:file = @x@ ( ... )`),
    /// keyed by the attribute's raw key. The empty key holds layer metadata.
    metadata: IndexMap<String, PropertyNode>,
}

impl PropertyNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value. A replaced key keeps its original position.
    pub fn insert(&mut self, raw_key: &str, value: PropertyValue) {
        match self.entries.get_mut(raw_key) {
            Some(entry) => entry.value = value,
            None => {
                self.entries.insert(
                    raw_key.to_string(),
                    Entry {
                        key: Key::classify(raw_key),
                        value,
                    },
                );
            }
        }
    }

    /// Take the nested node stored under `raw_key` for further filling,
    /// leaving an empty placeholder in place so insertion order is fixed
    /// at first open. Non-node values are replaced by a fresh node.
    pub(crate) fn take_node(&mut self, raw_key: &str) -> PropertyNode {
        match self.entries.get_mut(raw_key) {
            Some(Entry {
                value: PropertyValue::Node(node),
                ..
            }) => std::mem::take(node),
            _ => {
                self.insert(raw_key, PropertyValue::Node(PropertyNode::new()));
                PropertyNode::new()
            }
        }
    }

    pub(crate) fn set_metadata(&mut self, raw_key: &str, metadata: PropertyNode) {
        self.metadata.insert(raw_key.to_string(), metadata);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a value by its exact raw key.
    pub fn get(&self, raw_key: &str) -> Option<&PropertyValue> {
        self.entries.get(raw_key).map(|entry| &entry.value)
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(raw, entry)| (raw.as_str(), entry))
    }

    /// `def` prims directly under this node, in insertion order.
    pub fn prims(&self) -> impl Iterator<Item = PrimRef<'_>> {
        self.entries.values().filter_map(|entry| {
            let (prim_type, name) = entry.key.as_def()?;
            let node = entry.value.as_node()?;
            Some(PrimRef {
                prim_type,
                name,
                node,
            })
        })
    }

    /// Direct child prim with the given name, optionally restricted to a type.
    pub fn child_prim(&self, prim_type: Option<&str>, name: &str) -> Option<&PropertyNode> {
        self.entries.values().find_map(|entry| match &entry.key {
            Key::Prim {
                prim_type: t,
                name: n,
                ..
            } if n == name && prim_type.map_or(true, |wanted| t.as_deref() == Some(wanted)) => {
                entry.value.as_node()
            }
            _ => None,
        })
    }

    /// Walk an absolute prim path (`/Room/Materials/Wall`) from this node.
    pub fn prim_at_path(&self, path: &str) -> Option<&PropertyNode> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| node.child_prim(None, segment))
    }

    fn find_attribute(&self, name: &str) -> Option<(&str, &Entry)> {
        self.entries().find(|(_, entry)| {
            matches!(&entry.key, Key::Attribute { name: n, .. } if n == name)
        })
    }

    /// Attribute value by property name, whatever its declared type
    /// (`float2[] primvars:st` and `texCoord2f[] primvars:st` both match).
    pub fn attribute(&self, name: &str) -> Option<&PropertyValue> {
        self.find_attribute(name).map(|(_, entry)| &entry.value)
    }

    /// Attribute value text by property name.
    pub fn attribute_text(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(PropertyValue::as_text)
    }

    /// Declared type of an attribute (`float3`, `texCoord2f[]`).
    pub fn attribute_type(&self, name: &str) -> Option<&str> {
        match self.find_attribute(name) {
            Some((
                _,
                Entry {
                    key: Key::Attribute { type_name, .. },
                    ..
                },
            )) => Some(type_name),
            _ => None,
        }
    }

    /// Metadata scope attached to an attribute, by property name.
    pub fn attribute_metadata(&self, name: &str) -> Option<&PropertyNode> {
        let (raw, _) = self.find_attribute(name)?;
        self.metadata.get(raw)
    }

    /// Layer-level metadata (`defaultPrim`, `upAxis`, ...), present on parsed roots.
    pub fn layer_metadata(&self) -> Option<&PropertyNode> {
        self.metadata.get("")
    }

    /// Relationship target text by name.
    pub fn relationship(&self, name: &str) -> Option<&str> {
        self.entries.values().find_map(|entry| match &entry.key {
            Key::Relationship { name: n } if n == name => entry.value.as_text(),
            _ => None,
        })
    }

    /// Metadata value text by name, ignoring list-ops.
    pub fn metadata_value(&self, name: &str) -> Option<&str> {
        self.entries
            .values()
            .find_map(|entry| additive_metadata(entry, name))
    }

    /// Every additive metadata value with this name (`references`,
    /// `prepend references`, `append references`), in insertion order.
    pub fn metadata_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .values()
            .filter_map(move |entry| additive_metadata(entry, name))
    }

    /// Depth-first search (document order) for the first nested prim whose
    /// key satisfies `matches`. Iterative; gives up once `budget` is spent.
    pub fn find_prim<'a>(
        &'a self,
        budget: &mut VisitBudget,
        mut matches: impl FnMut(&Key) -> bool,
    ) -> Option<(&'a Key, &'a PropertyNode)> {
        let mut stack = vec![self.entries.values()];

        while let Some(iter) = stack.last_mut() {
            let Some(entry) = iter.next() else {
                stack.pop();
                continue;
            };

            if !budget.spend() {
                return None;
            }

            if let PropertyValue::Node(node) = &entry.value {
                if matches(&entry.key) {
                    return Some((&entry.key, node));
                }
                stack.push(node.entries.values());
            }
        }

        None
    }
}

/// Text of a metadata entry named `name` whose list-op adds items.
fn additive_metadata<'e>(entry: &'e Entry, name: &str) -> Option<&'e str> {
    match &entry.key {
        Key::Metadata { list_op, name: n } if n == name && list_op.map_or(true, ListOp::adds_items) => {
            entry.value.as_text()
        }
        _ => None,
    }
}

/// Upper bound on the number of entries a single tree search may visit.
#[derive(Clone, Copy, Debug)]
pub struct VisitBudget {
    remaining: usize,
    exhausted: bool,
}

impl VisitBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            remaining: limit,
            exhausted: false,
        }
    }

    /// Consume one visit. Returns false once the budget is used up.
    pub fn spend(&mut self) -> bool {
        if self.remaining == 0 {
            self.exhausted = true;
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
