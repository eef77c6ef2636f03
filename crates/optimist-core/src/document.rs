//! Persistent document snapshot
//!
//! A `Document` is a JSON-shaped tree whose containers sit behind `Arc`.
//! Every edit returns a new document that shares all untouched subtrees
//! with the old one. An edit that would not change anything hands back the
//! original tree, so identity (`Snapshot::same`) only flips on real change.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Number, Value};

use crate::{Batch, Edit, Snapshot};

/// One step of a path into a document
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// Field of a map
    Field(String),
    /// Position in a list
    Index(usize),
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => write!(f, ".{}", name),
            Key::Index(i) => write!(f, "[{}]", i),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Field(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Field(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// Node of a document tree
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Node {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    List(Arc<Vec<Node>>),
    Map(Arc<BTreeMap<String, Node>>),
}

impl Node {
    /// Empty map node
    pub fn map() -> Self {
        Node::Map(Arc::new(BTreeMap::new()))
    }

    /// Empty list node
    pub fn list() -> Self {
        Node::List(Arc::new(Vec::new()))
    }

    /// Identity comparison: containers compare by pointer, scalars by value
    pub fn same(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Map(a), Node::Map(b)) => Arc::ptr_eq(a, b),
            (Node::List(a), Node::List(b)) => Arc::ptr_eq(a, b),
            (Node::String(a), Node::String(b)) => Arc::ptr_eq(a, b) || a == b,
            (Node::Number(a), Node::Number(b)) => a == b,
            (Node::Bool(a), Node::Bool(b)) => a == b,
            (Node::Null, Node::Null) => true,
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Node::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Node::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Node::Map(map) => Some(&**map),
            _ => None,
        }
    }

    /// Direct child under `key`
    pub fn get(&self, key: &Key) -> Option<&Node> {
        match (self, key) {
            (Node::Map(map), Key::Field(name)) => map.get(name),
            (Node::List(items), Key::Index(i)) => items.get(*i),
            _ => None,
        }
    }

    /// Descendant at `path`; the empty path is the node itself
    pub fn get_in(&self, path: &[Key]) -> Option<&Node> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Copy of this node with `child` placed under `key`.
    ///
    /// A node of the wrong shape is replaced by a container of the right
    /// one; list gaps are padded with `Null`.
    fn with_child(&self, key: &Key, child: Node) -> Node {
        match (self, key) {
            (Node::Map(map), Key::Field(name)) => {
                let mut next = (**map).clone();
                next.insert(name.clone(), child);
                Node::Map(Arc::new(next))
            }
            (Node::List(items), Key::Index(i)) => {
                let mut next = (**items).clone();
                if *i < next.len() {
                    next[*i] = child;
                } else {
                    next.resize(*i, Node::Null);
                    next.push(child);
                }
                Node::List(Arc::new(next))
            }
            (_, Key::Field(name)) => {
                let mut next = BTreeMap::new();
                next.insert(name.clone(), child);
                Node::Map(Arc::new(next))
            }
            (_, Key::Index(i)) => {
                let mut next = vec![Node::Null; *i];
                next.push(child);
                Node::List(Arc::new(next))
            }
        }
    }

    fn without_child(&self, key: &Key) -> Node {
        match (self, key) {
            (Node::Map(map), Key::Field(name)) if map.contains_key(name) => {
                let mut next = (**map).clone();
                next.remove(name);
                Node::Map(Arc::new(next))
            }
            (Node::List(items), Key::Index(i)) if *i < items.len() => {
                let mut next = (**items).clone();
                next.remove(*i);
                Node::List(Arc::new(next))
            }
            _ => self.clone(),
        }
    }

    fn set_in(&self, path: &[Key], value: Node) -> Node {
        let Some((key, rest)) = path.split_first() else {
            return value;
        };
        match self.get(key) {
            Some(current) => {
                let child = current.set_in(rest, value);
                if child.same(current) {
                    self.clone()
                } else {
                    self.with_child(key, child)
                }
            }
            None => self.with_child(key, Node::Null.set_in(rest, value)),
        }
    }

    fn remove_in(&self, path: &[Key]) -> Node {
        match path.split_first() {
            None => self.clone(),
            Some((key, [])) => self.without_child(key),
            Some((key, rest)) => match self.get(key) {
                Some(current) => {
                    let child = current.remove_in(rest);
                    if child.same(current) {
                        self.clone()
                    } else {
                        self.with_child(key, child)
                    }
                }
                None => self.clone(),
            },
        }
    }

    /// Plain JSON projection
    pub fn to_value(&self) -> Value {
        match self {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::String(s) => Value::String(s.to_string()),
            Node::List(items) => Value::Array(items.iter().map(Node::to_value).collect()),
            Node::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

impl From<&Value> for Node {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(*b),
            Value::Number(n) => Node::Number(n.clone()),
            Value::String(s) => Node::String(Arc::from(s.as_str())),
            Value::Array(items) => Node::List(Arc::new(items.iter().map(Node::from).collect())),
            Value::Object(map) => Node::Map(Arc::new(
                map.iter().map(|(k, v)| (k.clone(), Node::from(v))).collect(),
            )),
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::from(&value)
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Bool(b)
    }
}

impl From<i64> for Node {
    fn from(n: i64) -> Self {
        Node::Number(n.into())
    }
}

impl From<i32> for Node {
    fn from(n: i32) -> Self {
        Node::Number(n.into())
    }
}

impl From<u64> for Node {
    fn from(n: u64) -> Self {
        Node::Number(n.into())
    }
}

/// Non-finite floats have no JSON form and become `Null`
impl From<f64> for Node {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Node::Number).unwrap_or(Node::Null)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::String(Arc::from(s))
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::String(Arc::from(s))
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::List(Arc::new(items))
    }
}

/// Persistent document - the snapshot type used by most callers
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    root: Node,
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl Document {
    /// Document with an empty map at the root
    pub fn new() -> Self {
        Document { root: Node::map() }
    }

    pub fn from_node(root: Node) -> Self {
        Document { root }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn get(&self, key: impl Into<Key>) -> Option<&Node> {
        self.root.get(&key.into())
    }

    pub fn get_in(&self, path: &[Key]) -> Option<&Node> {
        self.root.get_in(path)
    }

    /// Number of top-level entries (0 for a scalar root)
    pub fn len(&self) -> usize {
        match &self.root {
            Node::Map(map) => map.len(),
            Node::List(items) => items.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set(&self, key: impl Into<Key>, value: impl Into<Node>) -> Document {
        self.set_in(&[key.into()], value)
    }

    /// Place `value` at `path`, creating intermediate containers.
    /// The empty path replaces the root.
    pub fn set_in(&self, path: &[Key], value: impl Into<Node>) -> Document {
        self.rebuilt(self.root.set_in(path, value.into()))
    }

    pub fn remove(&self, key: impl Into<Key>) -> Document {
        self.remove_in(&[key.into()])
    }

    pub fn remove_in(&self, path: &[Key]) -> Document {
        self.rebuilt(self.root.remove_in(path))
    }

    pub fn update<F>(&self, key: impl Into<Key>, f: F) -> Document
    where
        F: FnOnce(Option<&Node>) -> Node,
    {
        self.update_in(&[key.into()], f)
    }

    pub fn update_in<F>(&self, path: &[Key], f: F) -> Document
    where
        F: FnOnce(Option<&Node>) -> Node,
    {
        let next = f(self.root.get_in(path));
        self.set_in(path, next)
    }

    /// Append to the list under `key`, creating it when absent
    pub fn push(&self, key: impl Into<Key>, value: impl Into<Node>) -> Document {
        let value = value.into();
        self.update(key, |current| {
            let mut items = current
                .and_then(Node::as_list)
                .map(<[Node]>::to_vec)
                .unwrap_or_default();
            items.push(value);
            Node::from(items)
        })
    }

    /// Insert `values` into the list under `key` starting at `at`
    /// (clamped to the list length)
    pub fn splice<I>(&self, key: impl Into<Key>, at: usize, values: I) -> Document
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        self.update(key, |current| {
            let mut items = current
                .and_then(Node::as_list)
                .map(<[Node]>::to_vec)
                .unwrap_or_default();
            let at = at.min(items.len());
            items.splice(at..at, values.into_iter().map(Into::into));
            Node::from(items)
        })
    }

    /// Apply every edit of `batch` in order
    pub fn apply_batch(&self, batch: &Batch) -> Document {
        batch.edits().iter().fold(self.clone(), |doc, edit| match edit {
            Edit::Set { path, value } => doc.set_in(path, value.clone()),
            Edit::Remove { path } => doc.remove_in(path),
        })
    }

    fn rebuilt(&self, root: Node) -> Document {
        if root.same(&self.root) {
            self.clone()
        } else {
            Document { root }
        }
    }
}

impl Snapshot for Document {
    type Plain = Value;

    fn from_plain(plain: &Value) -> Self {
        Document {
            root: Node::from(plain),
        }
    }

    fn to_plain(&self) -> Value {
        self.root.to_value()
    }

    fn same(&self, other: &Self) -> bool {
        self.root.same(&other.root)
    }
}
