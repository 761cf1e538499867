//! Skin weight re-association
//!
//! Pure math over positions and weight tables, independent of the scene:
//!
//! - vertex mapping: every target vertex takes the weights of the closest
//!   source vertex ([`ClosestPoint`], a kd-tree over source positions);
//! - influence mapping: every source influence is redirected to the target
//!   influence with the same short name, or to the closest one in space
//!   ([`match_influences`]);
//! - rows are renormalized; a row left empty goes wholly to the target
//!   influence closest to the vertex.
//!
//! All positions are expected in the same (world) space.

use glam::Vec3;
use kdtree::KdTree;
use kdtree::distance::squared_euclidean;

use crate::errors::{Result, RigError};
use crate::scene::WeightTable;

/// Nearest-vertex lookup over a fixed point set.
pub struct ClosestPoint {
    tree: KdTree<f32, usize, [f32; 3]>,
}

impl ClosestPoint {
    pub fn new(points: &[Vec3]) -> Result<Self> {
        let mut tree = KdTree::new(3);
        for (i, p) in points.iter().enumerate() {
            tree.add(p.to_array(), i)
                .map_err(|err| RigError::InvalidGeometry(format!("vertex {i}: {err:?}")))?;
        }
        Ok(Self { tree })
    }

    /// Index of the closest point, `None` for an empty set.
    pub fn nearest(&self, point: Vec3) -> Result<Option<usize>> {
        let found = self
            .tree
            .nearest(&point.to_array(), 1, &squared_euclidean)
            .map_err(|err| RigError::InvalidGeometry(format!("closest point query: {err:?}")))?;
        Ok(found.first().map(|&(_, &i)| i))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// Name and world position of a skin influence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Influence<'a> {
    pub name: &'a str,
    pub position: Vec3,
}

fn closest_influence(targets: &[Influence<'_>], candidates: impl Iterator<Item = usize>, position: Vec3) -> Option<usize> {
    candidates.min_by(|&a, &b| {
        position
            .distance_squared(targets[a].position)
            .total_cmp(&position.distance_squared(targets[b].position))
    })
}

/// Target column for every source column.
///
/// Same short name wins; ties and misses fall back to the closest target
/// influence in space.
pub fn match_influences(sources: &[Influence<'_>], targets: &[Influence<'_>]) -> Result<Vec<usize>> {
    if targets.is_empty() {
        return Err(RigError::EmptyInfluenceSet("weight transfer target".to_string()));
    }

    let mut map = Vec::with_capacity(sources.len());
    for source in sources {
        let named = targets
            .iter()
            .enumerate()
            .filter(|(_, t)| t.name == source.name)
            .map(|(i, _)| i);
        let column = closest_influence(targets, named, source.position)
            .or_else(|| closest_influence(targets, 0..targets.len(), source.position))
            .unwrap_or(0);
        map.push(column);
    }
    Ok(map)
}

/// Re-association counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassociationStats {
    pub vertices: usize,
    /// Rows that came out empty and were bound to the closest influence
    pub fallback_rows: usize,
}

/// Builds the target weight table.
///
/// `influence_map` comes from [`match_influences`]; `target_influences` must
/// be in target column order.
pub fn reassociate(
    source_positions: &[Vec3],
    source_weights: &WeightTable,
    influence_map: &[usize],
    target_positions: &[Vec3],
    target_influences: &[Influence<'_>],
) -> Result<(WeightTable, ReassociationStats)> {
    if source_weights.vertex_count() != source_positions.len() {
        return Err(RigError::InvalidGeometry(format!(
            "source has {} vertices but {} weight rows",
            source_positions.len(),
            source_weights.vertex_count()
        )));
    }
    if influence_map.len() != source_weights.influence_count() {
        return Err(RigError::InvalidGeometry(format!(
            "influence map covers {} of {} source influences",
            influence_map.len(),
            source_weights.influence_count()
        )));
    }
    if target_influences.is_empty() {
        return Err(RigError::EmptyInfluenceSet("weight transfer target".to_string()));
    }

    let lookup = ClosestPoint::new(source_positions)?;
    let mut table = WeightTable::new(target_positions.len(), target_influences.len());
    let mut stats = ReassociationStats::default();

    for (vertex, &position) in target_positions.iter().enumerate() {
        if let Some(source) = lookup.nearest(position)? {
            let row = table.row_mut(vertex);
            for (column, &weight) in source_weights.row(source).iter().enumerate() {
                row[influence_map[column]] += weight;
            }
        }

        if !table.normalize_row(vertex) {
            let column = closest_influence(target_influences, 0..target_influences.len(), position).unwrap_or(0);
            table.set(vertex, column, 1.0);
            stats.fallback_rows += 1;
        }
        stats.vertices += 1;
    }

    Ok((table, stats))
}
