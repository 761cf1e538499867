//! Short-name index
//!
//! Nodes are addressed by full path (`|a|b|c`) but artists work with short
//! names, which the scene does not force to be unique. [`NameIndex`] maps
//! every short name to its nodes in one pass so duplicate checks don't rescan
//! the scene.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::Result;
use crate::query;
use crate::scene::{NodeHandle, NodeKind, SceneGraph};

/// `"arm12"` -> `"arm"`. A name made only of digits is kept as is.
#[must_use]
pub fn strip_numeric_suffix(name: &str) -> &str {
    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if stem.is_empty() { name } else { stem }
}

/// `stem1`, `stem2`, ... : the first candidate for which `exists` is false.
pub fn next_free_name(stem: &str, exists: impl Fn(&str) -> bool) -> String {
    let mut n: u32 = 1;
    loop {
        let candidate = format!("{stem}{n}");
        if !exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

const INDEXED_KINDS: [NodeKind; 5] = [
    NodeKind::Transform,
    NodeKind::Joint,
    NodeKind::Mesh,
    NodeKind::SkinCluster,
    NodeKind::DagPose,
];

#[derive(Debug, Default, Clone)]
pub struct NameIndex {
    by_name: FxHashMap<String, SmallVec<[NodeHandle; 1]>>,
}

impl NameIndex {
    /// Indexes every node of the scene.
    pub fn build<G: SceneGraph + ?Sized>(graph: &G) -> Result<Self> {
        let mut index = Self::default();
        for kind in INDEXED_KINDS {
            for node in graph.nodes_of_kind(kind) {
                index.insert(graph.name(node)?, node);
            }
        }
        Ok(index)
    }

    pub fn insert(&mut self, name: &str, node: NodeHandle) {
        let entry = self.by_name.entry(name.to_string()).or_default();
        if !entry.contains(&node) {
            entry.push(node);
        }
    }

    pub fn remove(&mut self, name: &str, node: NodeHandle) {
        if let Some(entry) = self.by_name.get_mut(name) {
            entry.retain(|n| *n != node);
            if entry.is_empty() {
                self.by_name.remove(name);
            }
        }
    }

    #[must_use]
    pub fn handles(&self, name: &str) -> &[NodeHandle] {
        self.by_name.get(name).map_or(&[], |v| v.as_slice())
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// At most one node uses `name`.
    #[inline]
    #[must_use]
    pub fn is_unique(&self, name: &str) -> bool {
        self.handles(name).len() <= 1
    }

    /// Short names used by more than one node, sorted by name.
    #[must_use]
    pub fn duplicates(&self) -> Vec<(&str, &[NodeHandle])> {
        let mut out: Vec<(&str, &[NodeHandle])> = self
            .by_name
            .iter()
            .filter(|(_, handles)| handles.len() > 1)
            .map(|(name, handles)| (name.as_str(), handles.as_slice()))
            .collect();
        out.sort_unstable_by(|a, b| a.0.cmp(b.0));
        out
    }
}

/// One applied rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub node: NodeHandle,
    pub from: String,
    pub to: String,
}

/// Renames nodes until every short name is unique.
///
/// Deepest nodes go first so a parent is never renamed before its child; the
/// shallowest node of each clash keeps the name. New names are the old name
/// without its numeric suffix plus the next free number.
pub fn rename_duplicates<G: SceneGraph + ?Sized>(graph: &mut G) -> Result<Vec<Rename>> {
    let mut index = NameIndex::build(&*graph)?;

    let mut clashing: Vec<(usize, usize, NodeHandle)> = Vec::new();
    for (_, handles) in index.duplicates() {
        for &node in handles {
            clashing.push((query::depth(&*graph, node)?, clashing.len(), node));
        }
    }
    // 深度优先，同深度保持场景顺序
    clashing.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut renames = Vec::new();
    for (_, _, node) in clashing {
        let from = graph.name(node)?.to_string();
        if index.is_unique(&from) {
            continue;
        }
        let to = next_free_name(strip_numeric_suffix(&from), |candidate| index.contains(candidate));
        graph.rename(node, &to)?;
        index.remove(&from, node);
        index.insert(&to, node);
        log::info!("Renamed {from} to {to}");
        renames.push(Rename { node, from, to });
    }

    if renames.is_empty() {
        log::debug!("No duplicate short names");
    }
    Ok(renames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_numeric_suffix() {
        assert_eq!(strip_numeric_suffix("arm12"), "arm");
        assert_eq!(strip_numeric_suffix("arm"), "arm");
        assert_eq!(strip_numeric_suffix("l2_arm3"), "l2_arm");
        assert_eq!(strip_numeric_suffix("42"), "42");
    }

    #[test]
    fn test_next_free_name() {
        let taken = ["joint1", "joint2"];
        assert_eq!(next_free_name("joint", |n| taken.contains(&n)), "joint3");
        assert_eq!(next_free_name("hip", |n| taken.contains(&n)), "hip1");
    }
}
