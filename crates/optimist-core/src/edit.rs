//! Edits and edit batches
//!
//! A batch is a data-described mutation: a list of path edits applied in
//! order to a `Document`. Unlike a closure it can be malformed, so it is
//! validated before the engine accepts it.

use crate::{Key, Node, OptimistError, OptimistResult};

/// Single path edit
#[derive(Clone, Debug, PartialEq)]
pub enum Edit {
    /// Place a value at a path
    Set { path: Vec<Key>, value: Node },
    /// Remove whatever sits at a path
    Remove { path: Vec<Key> },
}

impl Edit {
    pub fn set(path: Vec<Key>, value: impl Into<Node>) -> Self {
        Edit::Set {
            path,
            value: value.into(),
        }
    }

    pub fn remove(path: Vec<Key>) -> Self {
        Edit::Remove { path }
    }

    pub fn path(&self) -> &[Key] {
        match self {
            Edit::Set { path, .. } | Edit::Remove { path } => path,
        }
    }
}

/// Ordered list of edits
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    edits: Vec<Edit>,
}

impl Batch {
    pub fn new() -> Self {
        Batch::default()
    }

    pub fn set(mut self, path: Vec<Key>, value: impl Into<Node>) -> Self {
        self.edits.push(Edit::set(path, value));
        self
    }

    pub fn remove(mut self, path: Vec<Key>) -> Self {
        self.edits.push(Edit::remove(path));
        self
    }

    pub fn push(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Every edit must address something below the root
    pub fn validate(&self) -> OptimistResult<()> {
        match self.edits.iter().position(|e| e.path().is_empty()) {
            Some(i) => Err(OptimistError::InvalidMutation(format!(
                "edit {} has an empty path",
                i
            ))),
            None => Ok(()),
        }
    }
}

impl FromIterator<Edit> for Batch {
    fn from_iter<I: IntoIterator<Item = Edit>>(iter: I) -> Self {
        Batch {
            edits: iter.into_iter().collect(),
        }
    }
}
