use crate::errors::{Result, RigError};
use crate::scene::NodeHandle;

/// Dense `vertex × influence` weight matrix, stored row-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightTable {
    influence_count: usize,
    values: Vec<f32>,
}

impl WeightTable {
    /// All-zero table.
    #[must_use]
    pub fn new(vertex_count: usize, influence_count: usize) -> Self {
        Self {
            influence_count,
            values: vec![0.0; vertex_count * influence_count],
        }
    }

    /// Builds a table from one row per vertex.
    pub fn from_rows(rows: &[Vec<f32>], influence_count: usize) -> Result<Self> {
        let mut table = Self::new(rows.len(), influence_count);
        for (vertex, row) in rows.iter().enumerate() {
            if row.len() != influence_count {
                return Err(RigError::InvalidGeometry(format!(
                    "weight row {vertex} has {} values, expected {influence_count}",
                    row.len()
                )));
            }
            table.row_mut(vertex).copy_from_slice(row);
        }
        Ok(table)
    }

    #[inline]
    #[must_use]
    pub fn influence_count(&self) -> usize {
        self.influence_count
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        if self.influence_count == 0 {
            0
        } else {
            self.values.len() / self.influence_count
        }
    }

    #[inline]
    #[must_use]
    pub fn row(&self, vertex: usize) -> &[f32] {
        let start = vertex * self.influence_count;
        &self.values[start..start + self.influence_count]
    }

    #[inline]
    pub fn row_mut(&mut self, vertex: usize) -> &mut [f32] {
        let start = vertex * self.influence_count;
        &mut self.values[start..start + self.influence_count]
    }

    #[inline]
    #[must_use]
    pub fn get(&self, vertex: usize, influence: usize) -> f32 {
        self.row(vertex)[influence]
    }

    #[inline]
    pub fn set(&mut self, vertex: usize, influence: usize, weight: f32) {
        self.row_mut(vertex)[influence] = weight;
    }

    #[inline]
    #[must_use]
    pub fn row_sum(&self, vertex: usize) -> f32 {
        self.row(vertex).iter().sum()
    }

    /// Scales a row so it sums to 1. Returns `false` when the row is empty.
    pub fn normalize_row(&mut self, vertex: usize) -> bool {
        let sum = self.row_sum(vertex);
        if sum <= f32::EPSILON {
            return false;
        }
        for w in self.row_mut(vertex) {
            *w /= sum;
        }
        true
    }

    /// Every row sums to 1 within `epsilon`.
    #[must_use]
    pub fn is_normalized(&self, epsilon: f32) -> bool {
        (0..self.vertex_count()).all(|v| (self.row_sum(v) - 1.0).abs() <= epsilon)
    }

    /// Drops one influence column. Remaining columns keep their order.
    pub fn remove_column(&mut self, influence: usize) {
        if influence >= self.influence_count {
            return;
        }
        let stride = self.influence_count;
        let mut column = 0;
        self.values.retain(|_| {
            let keep = column != influence;
            column = (column + 1) % stride;
            keep
        });
        self.influence_count -= 1;
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.values.chunks_exact(self.influence_count.max(1))
    }
}

/// Skin deformer component: influence joints bound to one mesh shape.
#[derive(Debug, Clone)]
pub struct SkinCluster {
    pub influences: Vec<NodeHandle>,
    pub geometry: NodeHandle,
    pub weights: WeightTable,
}

impl SkinCluster {
    /// Column of `joint` in the weight table.
    #[must_use]
    pub fn influence_index(&self, joint: NodeHandle) -> Option<usize> {
        self.influences.iter().position(|&j| j == joint)
    }

    /// Removes `joint` from the influence list and renormalizes the rows it
    /// contributed to. Returns the number of vertices left without weights.
    pub fn remove_influence(&mut self, joint: NodeHandle) -> usize {
        let Some(column) = self.influence_index(joint) else {
            return 0;
        };
        self.influences.remove(column);
        self.weights.remove_column(column);

        let mut empty = 0;
        for vertex in 0..self.weights.vertex_count() {
            if !self.weights.normalize_row(vertex) {
                empty += 1;
            }
        }
        empty
    }
}

/// Pose snapshot captured at bind time.
#[derive(Debug, Clone, Default)]
pub struct BindPose {
    pub members: Vec<NodeHandle>,
}
