//! In-memory row tree.

use std::slice;

use crate::model::TreePath;
use crate::value::Value;

/// One loaded row plus its materialized children.
///
/// `children_len` is the number of children the data source reported; it
/// may be larger than `len()` while the children are not loaded yet. A node
/// whose `children_len` is zero is a leaf.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    data: Vec<Value>,
    children_len: usize,
    path: Option<TreePath>,
    children: Vec<Node>,
}

impl Node {
    /// A leaf row.
    pub fn new(data: Vec<Value>) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    /// A row with `children_len` children still to be loaded.
    pub fn with_children_len(data: Vec<Value>, children_len: usize) -> Self {
        Self {
            data,
            children_len,
            ..Default::default()
        }
    }

    /// An empty root node at path `()`.
    pub fn root() -> Self {
        Self {
            path: Some(TreePath::root()),
            ..Default::default()
        }
    }

    /// Column values in schema order.
    #[inline]
    pub fn data(&self) -> &[Value] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [Value] {
        &mut self.data
    }

    #[inline]
    pub fn children_len(&self) -> usize {
        self.children_len
    }

    #[inline]
    pub fn set_children_len(&mut self, children_len: usize) {
        self.children_len = children_len;
    }

    /// Path from the root; `None` until the node is attached to a model.
    #[inline]
    pub fn path(&self) -> Option<&TreePath> {
        self.path.as_ref()
    }

    #[inline]
    pub fn set_path(&mut self, path: TreePath) {
        self.path = Some(path);
    }

    /// Number of materialized children.
    #[inline]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children_len == 0
    }

    /// Whether every reported child is materialized, optionally checking the
    /// whole subtree.
    pub fn is_children_loaded(&self, recursive: bool) -> bool {
        self.children.len() == self.children_len
            && (!recursive || self.children.iter().all(|c| c.is_children_loaded(true)))
    }

    #[inline]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Node> {
        self.children.get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.children.get_mut(index)
    }

    #[inline]
    pub fn last(&self) -> Option<&Node> {
        self.children.last()
    }

    pub fn push(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Move all children of `other` to the end of this node's children.
    pub fn append(&mut self, other: &mut Node) {
        self.children.append(&mut other.children);
    }

    pub fn iter(&self) -> slice::Iter<'_, Node> {
        self.children.iter()
    }

    /// The node at `indices` below this one.
    pub fn descendant(&self, indices: &[usize]) -> Option<&Node> {
        indices.iter().try_fold(self, |node, &i| node.children.get(i))
    }

    pub fn descendant_mut(&mut self, indices: &[usize]) -> Option<&mut Node> {
        indices
            .iter()
            .try_fold(self, |node, &i| node.children.get_mut(i))
    }

    /// Set the path of this node and of every materialized descendant.
    pub(crate) fn assign_paths(&mut self, path: TreePath) {
        for (i, child) in self.children.iter_mut().enumerate() {
            child.assign_paths(path.child(i));
        }
        self.path = Some(path);
    }
}

impl<'a> IntoIterator for &'a Node {
    type Item = &'a Node;
    type IntoIter = slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.children.iter()
    }
}
