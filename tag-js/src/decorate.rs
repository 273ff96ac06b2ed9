//! Parent linkage for arena trees.
//!
//! Decoration never adds back-pointers to nodes. Instead, a side table indexed
//! by [`NodeId`] records where each node hangs in the tree. Sequences are not
//! nodes, so a link always names the true structural parent together with the
//! property through which the sequence was reached.

use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::ast::Prop;
use crate::ast::SyntaxTree;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;
use tracing::debug;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParentLink {
  pub parent: NodeId,
  pub prop: Prop,
  /// Position within the sequence, if the node was reached through one.
  pub index: Option<u32>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PathSegment {
  pub kind: NodeKind,
  pub prop: Prop,
  pub index: Option<u32>,
}

impl Display for PathSegment {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.kind, self.prop)?;
    if let Some(index) = self.index {
      write!(f, "[{index}]")?;
    }
    Ok(())
  }
}

/// Root-to-node trace of `(parent kind, property)` segments. Only used for
/// diagnostics.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct StructuralPath(pub Vec<PathSegment>);

impl Display for StructuralPath {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    for (i, segment) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str(" > ")?;
      }
      segment.fmt(f)?;
    }
    Ok(())
  }
}

pub struct DecoratedTree {
  tree: SyntaxTree,
  links: Vec<Option<ParentLink>>,
}

impl DecoratedTree {
  /// Records a parent link for every node reachable from the root.
  ///
  /// A parser may hang the same node at two positions (for example the key
  /// and value of a shorthand property). Since a node can only carry one link,
  /// each repeated occurrence is replaced by a shallow clone; the clone's
  /// children are in turn cloned when the walk reaches them.
  pub fn new(mut tree: SyntaxTree) -> DecoratedTree {
    let mut links: Vec<Option<ParentLink>> = vec![None; tree.len()];
    let mut visited = vec![false; tree.len()];
    let mut cloned = 0usize;
    let root = tree.root();
    visited[root.index()] = true;

    let mut stack = vec![root];
    while let Some(parent) = stack.pop() {
      for field in 0..tree.node(parent).fields.len() {
        let slot = &tree.node(parent).fields[field];
        let prop = slot.prop.clone();
        for (index, mut child) in slot.child.ids() {
          if visited[child.index()] {
            child = tree.shallow_clone(child);
            tree.repoint(parent, field, index, child);
            links.push(None);
            visited.push(false);
            cloned += 1;
          }
          visited[child.index()] = true;
          links[child.index()] = Some(ParentLink {
            parent,
            prop: prop.clone(),
            index,
          });
          stack.push(child);
        }
      }
    }
    if cloned > 0 {
      debug!(cloned, "cloned nodes shared between tree positions");
    }
    DecoratedTree { tree, links }
  }

  pub fn tree(&self) -> &SyntaxTree {
    &self.tree
  }

  pub fn parent(&self, node: NodeId) -> Option<&ParentLink> {
    self.links.get(node.index()).and_then(Option::as_ref)
  }

  /// Nearest strict ancestor of kind `kind`, with the property of that
  /// ancestor through which `node` is reached.
  pub fn nearest_ancestor_of_kind(&self, node: NodeId, kind: &NodeKind) -> Option<(NodeId, Prop)> {
    let mut current = node;
    while let Some(link) = self.parent(current) {
      if self.tree.node(link.parent).is(kind) {
        return Some((link.parent, link.prop.clone()));
      }
      current = link.parent;
    }
    None
  }

  pub fn structural_path(&self, node: NodeId) -> StructuralPath {
    let mut segments = Vec::new();
    let mut current = node;
    while let Some(link) = self.parent(current) {
      segments.push(PathSegment {
        kind: self.tree.node(link.parent).kind.clone(),
        prop: link.prop.clone(),
        index: link.index,
      });
      current = link.parent;
    }
    segments.reverse();
    StructuralPath(segments)
  }
}
