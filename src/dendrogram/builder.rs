use super::{
    ancestry::AncestorMap, index_map::IndexMap, structure::Structure, ComputeError, Dendrogram,
    StructureId, TYPE_BRANCH, TYPE_LEAF,
};
use crate::{
    helpers::{aliases::Vec3u, utils::unravel_index},
    traits::FluxValue,
};
use log::{debug, trace};
use ndarray::{Array3, ArrayD};
use std::{cmp::Ordering, collections::BTreeMap};

///
/// Single descending-flux pass over a 2D or 3D cube. Every voxel above
/// `min_flux` either extends an existing structure, seeds a new leaf, or
/// merges the structures it touches. When a merge happens, leaves that
/// are too small (`min_npix`) or whose peak rises less than `min_delta`
/// above the saddle are absorbed instead of kept as children.
///
/// ```
/// use dendro::dendrogram::DendrogramBuilder;
/// use ndarray::Array3;
///
/// let cube = Array3::<f64>::zeros((4, 4, 4));
/// let dendrogram = DendrogramBuilder::new()
///     .min_flux(1.4)
///     .min_npix(4)
///     .min_delta(0.3)
///     .compute(cube.into_dyn())
///     .expect("3D input");
/// assert!(dendrogram.trunk().is_empty());
/// ```
///
pub struct DendrogramBuilder<T> {
    min_flux: T,
    min_npix: usize,
    min_delta: T,
}

impl<T: FluxValue> Default for DendrogramBuilder<T> {
    fn default() -> Self {
        Self {
            min_flux: T::neg_infinity(),
            min_npix: 0,
            min_delta: T::zero(),
        }
    }
}

impl<T: FluxValue> DendrogramBuilder<T> {
    pub fn new() -> Self {
        Default::default()
    }

    /// Voxels at or below this value are background
    pub fn min_flux(mut self, min_flux: T) -> Self {
        self.min_flux = min_flux;
        self
    }

    /// Smallest voxel count a leaf needs to survive a merge
    pub fn min_npix(mut self, min_npix: usize) -> Self {
        self.min_npix = min_npix;
        self
    }

    /// Smallest peak-to-saddle prominence a leaf needs to survive a merge
    pub fn min_delta(mut self, min_delta: T) -> Self {
        self.min_delta = min_delta;
        self
    }

    pub fn compute(&self, data: ArrayD<T>) -> Result<Dendrogram<T>, ComputeError> {
        let n_dim = data.ndim();
        let (nz, ny, nx) = match data.shape() {
            [ny, nx] => (1, *ny, *nx),
            [nz, ny, nx] => (*nz, *ny, *nx),
            _ => return Err(ComputeError::InvalidDimensionality(n_dim)),
        };

        if self.min_flux.is_nan() || self.min_delta.is_nan() || self.min_delta < T::zero() {
            return Err(ComputeError::InvalidThreshold);
        }

        // Filter and sort by descending flux. Ties are broken by linear
        // index, which makes the whole pass deterministic.
        let mut sorted: Vec<(usize, T)> = data
            .iter()
            .enumerate()
            .filter(|(_, flux)| **flux > self.min_flux)
            .map(|(index, flux)| (index, *flux))
            .collect();
        sorted.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        debug!("{} voxels above minimum flux", sorted.len());

        let mut index_map = IndexMap::new(nz, ny, nx);
        let mut ancestors = AncestorMap::default();
        let mut items = BTreeMap::new();
        let mut next_id: StructureId = 0;

        for (count, &(linear, flux)) in sorted.iter().enumerate() {
            if count % 10_000 == 0 {
                trace!("{} of {} voxels processed", count, sorted.len());
            }

            let pos = unravel_index(linear, ny, nx);
            debug_assert!(index_map.get(&pos) == 0, "voxel visited twice");

            // Live structures touching this voxel
            let mut adjacent: Vec<StructureId> = index_map
                .neighbours(&pos)
                .iter()
                .filter(|&&id| id != 0)
                .map(|&id| ancestors.resolve(id))
                .collect();
            adjacent.sort_unstable();
            adjacent.dedup();

            match adjacent.len() {
                0 => {
                    next_id += 1;
                    items.insert(next_id, Structure::leaf(next_id, pos, flux));
                    index_map.set(&pos, next_id);
                    ancestors.insert_root(next_id);
                }
                1 => {
                    let id = adjacent[0];
                    items
                        .get_mut(&id)
                        .expect("resolved ancestor is live")
                        .add_voxel(pos, flux);
                    index_map.set(&pos, id);
                }
                _ => {
                    self.merge_adjacent(
                        pos,
                        flux,
                        adjacent,
                        &mut items,
                        &mut index_map,
                        &mut ancestors,
                        &mut next_id,
                    );
                }
            }
        }

        debug!("{} structures after the scan", items.len());

        // Orphan leaves that never became significant are dropped. Their
        // index map entries are left stale; the structure table is
        // authoritative and unknown ids read as background.
        let pruned: Vec<StructureId> = items
            .iter()
            .filter(|(id, item)| {
                item.is_leaf()
                    && ancestors.is_root(**id)
                    && (item.npix() < self.min_npix
                        || item.fmax() - item.fmin() < self.min_delta)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in &pruned {
            items.remove(id);
        }

        debug!(
            "{} orphan leaves pruned, {} structures in trunk",
            pruned.len(),
            items.len()
        );

        // BTreeMap iterates ascending by id
        let trunk: Vec<Structure<T>> = items.into_values().collect();

        let mut item_type_map = Array3::<u8>::zeros((nz, ny, nx));
        for root in &trunk {
            stamp_types(root, &mut item_type_map);
        }

        let index_interior = index_map.interior();
        let (index_out, type_out) = if n_dim == 2 {
            (
                index_interior
                    .into_shape((ny, nx))
                    .expect("owned map is contiguous")
                    .into_dyn(),
                item_type_map
                    .into_shape((ny, nx))
                    .expect("owned map is contiguous")
                    .into_dyn(),
            )
        } else {
            (index_interior.into_dyn(), item_type_map.into_dyn())
        };

        Ok(Dendrogram::from_parts(data, trunk, index_out, type_out))
    }

    /// Multi-way merge at voxel `pos`: the sensitive step. `adjacent`
    /// holds the distinct live structures touching the voxel, ascending
    /// by id.
    #[allow(clippy::too_many_arguments)]
    fn merge_adjacent(
        &self,
        pos: Vec3u,
        flux: T,
        adjacent: Vec<StructureId>,
        items: &mut BTreeMap<StructureId, Structure<T>>,
        index_map: &mut IndexMap,
        ancestors: &mut AncestorMap,
        next_id: &mut StructureId,
    ) {
        // Leaves too small or too shallow above the current saddle lose
        // their identity; branches always keep theirs.
        let (significant, insignificant): (Vec<StructureId>, Vec<StructureId>) =
            adjacent.into_iter().partition(|id| {
                let item = &items[id];
                !(item.is_leaf()
                    && (item.npix() < self.min_npix || item.fmax() - flux < self.min_delta))
            });

        let reference = match significant.len() {
            0 => {
                // Nothing survives on its own; the lowest id absorbs the
                // rest and the merge voxel.
                let id = insignificant[0];
                items
                    .get_mut(&id)
                    .expect("adjacent structure is live")
                    .add_voxel(pos, flux);
                id
            }
            1 => {
                let id = significant[0];
                items
                    .get_mut(&id)
                    .expect("adjacent structure is live")
                    .add_voxel(pos, flux);
                id
            }
            _ => {
                // Two or more surviving structures: a new branch seeded
                // at the saddle takes them as children, ascending by id.
                *next_id += 1;
                let id = *next_id;

                let children: Vec<Structure<T>> = significant
                    .iter()
                    .map(|c| items.remove(c).expect("child structure is live"))
                    .collect();
                items.insert(id, Structure::branch(id, children, pos, flux));
                ancestors.insert_root(id);

                for &child in &significant {
                    ancestors.reparent(child, id);
                }

                id
            }
        };

        index_map.set(&pos, reference);

        for id in insignificant {
            if id == reference {
                continue;
            }

            let removed = items.remove(&id).expect("adjacent structure is live");
            removed.stamp_footprint(index_map, reference, false);
            items
                .get_mut(&reference)
                .expect("reference structure is live")
                .merge(removed);
            ancestors.retire(id);
        }
    }
}

fn stamp_types<T: FluxValue>(structure: &Structure<T>, map: &mut Array3<u8>) {
    let code = if structure.is_leaf() {
        TYPE_LEAF
    } else {
        TYPE_BRANCH
    };

    for voxel in structure.voxels() {
        map[[voxel.pos.z, voxel.pos.y, voxel.pos.x]] = code;
    }

    for child in structure.children() {
        stamp_types(child, map);
    }
}
