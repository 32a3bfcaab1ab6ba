pub mod builder;
pub mod newick;

mod ancestry;
mod index_map;
mod structure;

#[cfg(test)]
mod tests;

pub use builder::DendrogramBuilder;
pub use structure::{Branch, Leaf, Structure, Voxel};

use crate::traits::FluxValue;
use ndarray::{Array2, Array3, ArrayD};

/// Identifier of a structure. Dense, assigned in creation order, never
/// reused; 0 is reserved for background.
pub type StructureId = u32;

/// Type map code for voxels owned by a branch
pub const TYPE_BRANCH: u8 = 1;
/// Type map code for voxels owned by a leaf
pub const TYPE_LEAF: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeError {
    /// Input rank is neither 2 nor 3
    InvalidDimensionality(usize),
    /// `min_flux` is NaN, or `min_delta` is NaN or negative
    InvalidThreshold,
}

///
/// Hierarchical tree of nested local maxima of a sampled field. Built
/// once by [`DendrogramBuilder`]; immutable afterwards.
///
pub struct Dendrogram<T: FluxValue> {
    data: ArrayD<T>,
    trunk: Vec<Structure<T>>,
    index_map: ArrayD<StructureId>,
    item_type_map: ArrayD<u8>,
}

impl<T: FluxValue> Dendrogram<T> {
    /// Computes the dendrogram of a 2D or 3D cube with default
    /// thresholds; use [`DendrogramBuilder`] to set them.
    pub fn compute(data: ArrayD<T>) -> Result<Self, ComputeError> {
        DendrogramBuilder::new().compute(data)
    }

    pub fn compute_cube(data: Array3<T>) -> Result<Self, ComputeError> {
        Self::compute(data.into_dyn())
    }

    pub fn compute_image(data: Array2<T>) -> Result<Self, ComputeError> {
        Self::compute(data.into_dyn())
    }

    pub(crate) fn from_parts(
        data: ArrayD<T>,
        trunk: Vec<Structure<T>>,
        index_map: ArrayD<StructureId>,
        item_type_map: ArrayD<u8>,
    ) -> Self {
        Self {
            data,
            trunk,
            index_map,
            item_type_map,
        }
    }

    /// Surviving root structures, ascending by id
    #[inline]
    pub fn trunk(&self) -> &[Structure<T>] {
        &self.trunk
    }

    /// All leaves of the tree, in trunk and child order
    pub fn leaves(&self) -> Vec<&Leaf<T>> {
        self.trunk.iter().flat_map(|root| root.leaves()).collect()
    }

    /// The sampled field, in its original dimensionality
    #[inline]
    pub fn data(&self) -> &ArrayD<T> {
        &self.data
    }

    /// Voxel-to-structure map, same shape as the input. Ids absent from
    /// the tree belong to pruned structures and read as background.
    #[inline]
    pub fn index_map(&self) -> &ArrayD<StructureId> {
        &self.index_map
    }

    /// 2 over leaf voxels, 1 over branch-owned voxels, 0 elsewhere
    #[inline]
    pub fn item_type_map(&self) -> &ArrayD<u8> {
        &self.item_type_map
    }

    #[inline]
    pub fn n_dim(&self) -> usize {
        self.data.ndim()
    }

    /// Newick rendition of the trunk
    pub fn to_newick(&self) -> String {
        newick::to_newick(&self.trunk)
    }
}
