use super::{index_map::IndexMap, StructureId};
use crate::{helpers::aliases::Vec3u, traits::FluxValue};

/// One sample owned by a structure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voxel<T> {
    pub pos: Vec3u,
    pub flux: T,
}

/// Terminal structure: a local cluster of voxels that never merged with
/// a sibling above the current iso-contour
#[derive(Debug)]
pub struct Leaf<T: FluxValue> {
    id: StructureId,
    voxels: Vec<Voxel<T>>,
    fmin: T,
    fmax: T,
}

impl<T: FluxValue> Leaf<T> {
    pub fn new(id: StructureId, pos: Vec3u, flux: T) -> Self {
        Self {
            id,
            voxels: vec![Voxel { pos, flux }],
            fmin: flux,
            fmax: flux,
        }
    }

    #[inline]
    pub fn id(&self) -> StructureId {
        self.id
    }

    #[inline]
    pub fn npix(&self) -> usize {
        self.voxels.len()
    }

    #[inline]
    pub fn fmin(&self) -> T {
        self.fmin
    }

    #[inline]
    pub fn fmax(&self) -> T {
        self.fmax
    }

    /// First voxel assigned to the leaf
    #[inline]
    pub fn seed(&self) -> &Voxel<T> {
        &self.voxels[0]
    }

    #[inline]
    pub fn voxels(&self) -> &[Voxel<T>] {
        &self.voxels
    }
}

/// Internal structure created at a merge saddle. Owns its children
/// outright plus the voxels added at and after its own creation.
#[derive(Debug)]
pub struct Branch<T: FluxValue> {
    id: StructureId,
    voxels: Vec<Voxel<T>>,
    fmin: T,
    fmax: T,
    children: Vec<Structure<T>>,
}

impl<T: FluxValue> Branch<T> {
    /// Creates a branch seeded at the merge voxel. `children` must hold
    /// at least two structures; their peaks all rise above `flux`.
    pub fn new(id: StructureId, children: Vec<Structure<T>>, pos: Vec3u, flux: T) -> Self {
        assert!(
            children.len() >= 2,
            "branch {} created with {} children",
            id,
            children.len()
        );

        let fmax = children.iter().fold(flux, |acc, c| acc.max(c.fmax()));

        Self {
            id,
            voxels: vec![Voxel { pos, flux }],
            fmin: flux,
            fmax,
            children,
        }
    }

    #[inline]
    pub fn id(&self) -> StructureId {
        self.id
    }

    /// Recursive footprint count: own voxels plus all descendants'
    pub fn npix(&self) -> usize {
        self.voxels.len() + self.children.iter().map(|c| c.npix()).sum::<usize>()
    }

    #[inline]
    pub fn fmin(&self) -> T {
        self.fmin
    }

    #[inline]
    pub fn fmax(&self) -> T {
        self.fmax
    }

    /// The merge voxel whose processing created this branch
    #[inline]
    pub fn seed(&self) -> &Voxel<T> {
        &self.voxels[0]
    }

    /// Voxels owned by the branch itself, descendants excluded
    #[inline]
    pub fn voxels(&self) -> &[Voxel<T>] {
        &self.voxels
    }

    #[inline]
    pub fn children(&self) -> &[Structure<T>] {
        &self.children
    }
}

/// A node of the dendrogram
#[derive(Debug)]
pub enum Structure<T: FluxValue> {
    Leaf(Leaf<T>),
    Branch(Branch<T>),
}

impl<T: FluxValue> Structure<T> {
    #[inline]
    pub fn leaf(id: StructureId, pos: Vec3u, flux: T) -> Self {
        Structure::Leaf(Leaf::new(id, pos, flux))
    }

    #[inline]
    pub fn branch(id: StructureId, children: Vec<Structure<T>>, pos: Vec3u, flux: T) -> Self {
        Structure::Branch(Branch::new(id, children, pos, flux))
    }

    #[inline]
    pub fn id(&self) -> StructureId {
        match self {
            Structure::Leaf(leaf) => leaf.id,
            Structure::Branch(branch) => branch.id,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Structure::Leaf(_))
    }

    /// Recursive footprint count
    pub fn npix(&self) -> usize {
        match self {
            Structure::Leaf(leaf) => leaf.npix(),
            Structure::Branch(branch) => branch.npix(),
        }
    }

    #[inline]
    pub fn fmin(&self) -> T {
        match self {
            Structure::Leaf(leaf) => leaf.fmin,
            Structure::Branch(branch) => branch.fmin,
        }
    }

    #[inline]
    pub fn fmax(&self) -> T {
        match self {
            Structure::Leaf(leaf) => leaf.fmax,
            Structure::Branch(branch) => branch.fmax,
        }
    }

    /// First voxel assigned; for a branch this is the merge saddle
    #[inline]
    pub fn seed(&self) -> &Voxel<T> {
        match self {
            Structure::Leaf(leaf) => leaf.seed(),
            Structure::Branch(branch) => branch.seed(),
        }
    }

    /// Voxels owned directly, descendants excluded
    #[inline]
    pub fn voxels(&self) -> &[Voxel<T>] {
        match self {
            Structure::Leaf(leaf) => &leaf.voxels,
            Structure::Branch(branch) => &branch.voxels,
        }
    }

    #[inline]
    pub fn children(&self) -> &[Structure<T>] {
        match self {
            Structure::Leaf(_) => &[],
            Structure::Branch(branch) => &branch.children,
        }
    }

    /// Appends a voxel and updates the running flux range
    pub fn add_voxel(&mut self, pos: Vec3u, flux: T) {
        let (voxels, fmin, fmax) = match self {
            Structure::Leaf(leaf) => (&mut leaf.voxels, &mut leaf.fmin, &mut leaf.fmax),
            Structure::Branch(branch) => (&mut branch.voxels, &mut branch.fmin, &mut branch.fmax),
        };

        voxels.push(Voxel { pos, flux });
        *fmin = fmin.min(flux);
        *fmax = fmax.max(flux);
    }

    /// Absorbs `other`'s own voxels (and children, if `other` is a
    /// branch) into `self`. The index map is not touched; callers stamp
    /// the absorbed footprint first.
    pub fn merge(&mut self, other: Structure<T>) {
        assert_ne!(
            self.id(),
            other.id(),
            "structure {} cannot merge into itself",
            self.id()
        );

        let other_id = other.id();
        let (other_voxels, other_fmin, other_fmax, other_children) = match other {
            Structure::Leaf(leaf) => (leaf.voxels, leaf.fmin, leaf.fmax, Vec::new()),
            Structure::Branch(branch) => (branch.voxels, branch.fmin, branch.fmax, branch.children),
        };

        match self {
            Structure::Leaf(leaf) => {
                if !other_children.is_empty() {
                    panic!("branch {} merged into leaf {}", other_id, leaf.id);
                }

                leaf.voxels.extend(other_voxels);
                leaf.fmin = leaf.fmin.min(other_fmin);
                leaf.fmax = leaf.fmax.max(other_fmax);
            }
            Structure::Branch(branch) => {
                branch.voxels.extend(other_voxels);
                branch.children.extend(other_children);
                branch.fmin = branch.fmin.min(other_fmin);
                branch.fmax = branch.fmax.max(other_fmax);
            }
        }
    }

    /// Rewrites the index map entry of every owned voxel (and of every
    /// descendant's voxel when `recursive`) to `id`
    pub fn stamp_footprint(&self, map: &mut IndexMap, id: StructureId, recursive: bool) {
        for voxel in self.voxels() {
            map.set(&voxel.pos, id);
        }

        if recursive {
            for child in self.children() {
                child.stamp_footprint(map, id, true);
            }
        }
    }

    /// All leaves of the subtree in child order; a leaf yields itself
    pub fn leaves(&self) -> Vec<&Leaf<T>> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a Leaf<T>>) {
        match self {
            Structure::Leaf(leaf) => leaves.push(leaf),
            Structure::Branch(branch) => {
                for child in &branch.children {
                    child.collect_leaves(leaves);
                }
            }
        }
    }
}
