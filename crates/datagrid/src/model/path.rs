//! Tree paths for addressing rows.
//!
//! A `TreePath` is the list of zero-based child indices leading from the
//! (never exposed) root node to a row. The empty path addresses the root,
//! that is, the top-level rows collectively.
//!
//! # Example
//!
//! ```
//! use datagrid::TreePath;
//!
//! let folder = TreePath::from([3]);
//! let file = folder.child(1);
//! assert_eq!(file.to_string(), "3:1");
//! assert_eq!(file.parent(), Some(folder));
//! ```

use std::fmt;
use std::str::FromStr;

/// Position of a row in the tree.
///
/// Paths order lexicographically, which is also depth-first pre-order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreePath(Vec<usize>);

impl TreePath {
    /// The root path `()`.
    #[inline]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    #[inline]
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of indices; top-level rows have depth 1.
    #[inline]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Index of this row within its parent.
    #[inline]
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Path of the parent; `None` for the root.
    pub fn parent(&self) -> Option<TreePath> {
        let (_, parent) = self.0.split_last()?;
        Some(TreePath(parent.to_vec()))
    }

    /// Path of the `n`th child of this row.
    pub fn child(&self, n: usize) -> TreePath {
        let mut indices = Vec::with_capacity(self.0.len() + 1);
        indices.extend_from_slice(&self.0);
        indices.push(n);
        TreePath(indices)
    }

    /// Path of the following sibling; `None` for the root.
    pub fn next_sibling(&self) -> Option<TreePath> {
        let mut indices = self.0.clone();
        *indices.last_mut()? += 1;
        Some(TreePath(indices))
    }

    /// Whether `self` lies inside the inclusive window `start..=end`.
    pub fn is_between(&self, start: &TreePath, end: &TreePath) -> bool {
        start <= self && self <= end
    }
}

impl From<Vec<usize>> for TreePath {
    fn from(indices: Vec<usize>) -> Self {
        TreePath(indices)
    }
}

impl From<&[usize]> for TreePath {
    fn from(indices: &[usize]) -> Self {
        TreePath(indices.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for TreePath {
    fn from(indices: [usize; N]) -> Self {
        TreePath(indices.to_vec())
    }
}

/// Colon separated indices, `3:1:0`. The root prints as an empty string.
impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{index}")?;
        }
        Ok(())
    }
}

impl FromStr for TreePath {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(TreePath::root());
        }
        s.split(':')
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(TreePath)
    }
}
