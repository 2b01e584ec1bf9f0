//! Tree domain — the namespaced-key tree built from label declarations.

use std::collections::BTreeMap;

use super::CompileError;

/// A node in the dot-separated key tree. The root carries an empty
/// value; children are keyed by path segment. `BTreeMap` keeps child
/// iteration deterministic so compiled output is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeNode {
    pub value: String,
    pub children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            children: BTreeMap::new(),
        }
    }

    /// Insert a value at the given segment path. Only the final segment
    /// is created; a missing intermediate segment is an error, so a
    /// partial declaration cannot fabricate a log source that was never
    /// declared.
    pub fn insert(&mut self, segments: &[&str], value: &str) -> Result<(), CompileError> {
        match segments {
            [] => Ok(()),
            [last] => {
                // Re-inserting an existing segment keeps its subtree.
                let child = self
                    .children
                    .entry((*last).to_string())
                    .or_insert_with(TreeNode::default);
                child.value = value.to_string();
                Ok(())
            }
            [head, rest @ ..] => {
                let child = self
                    .children
                    .get_mut(*head)
                    .ok_or_else(|| CompileError::MissingParent((*head).to_string()))?;
                child.insert(rest, value)
            }
        }
    }

    pub fn child(&self, key: &str) -> Option<&TreeNode> {
        self.children.get(key)
    }

    /// Convenience for grandchild lookups: the child's scalar value, or
    /// an empty string when the child does not exist.
    pub fn child_value(&self, key: &str) -> &str {
        self.children.get(key).map(|c| c.value.as_str()).unwrap_or("")
    }
}
