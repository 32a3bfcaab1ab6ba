use super::StructureId;
use crate::helpers::aliases::Vec3u;
use ndarray::{s, Array3};

///
/// Voxel-to-structure index padded with a one voxel wide sentinel shell.
/// Voxel `(z, y, x)` lives at `(z + 1, y + 1, x + 1)`, so the six
/// neighbour reads of any in-cube voxel are in bounds without range
/// checks. The shell is never written and always reads as background.
///
pub struct IndexMap {
    cells: Array3<StructureId>,
}

impl IndexMap {
    pub fn new(nz: usize, ny: usize, nx: usize) -> Self {
        Self {
            cells: Array3::zeros((nz + 2, ny + 2, nx + 2)),
        }
    }

    /// Id of the structure owning `v`, or 0 if unassigned
    #[inline]
    pub fn get(&self, v: &Vec3u) -> StructureId {
        self.cells[[v.z + 1, v.y + 1, v.x + 1]]
    }

    #[inline]
    pub fn set(&mut self, v: &Vec3u, id: StructureId) {
        self.cells[[v.z + 1, v.y + 1, v.x + 1]] = id;
    }

    /// Ids of the six axis-aligned neighbours of `v`. Reads that fall
    /// outside the cube land on the sentinel shell and return 0.
    #[inline]
    pub fn neighbours(&self, v: &Vec3u) -> [StructureId; 6] {
        let (z, y, x) = (v.z + 1, v.y + 1, v.x + 1);

        [
            self.cells[[z, y, x - 1]],
            self.cells[[z, y, x + 1]],
            self.cells[[z, y - 1, x]],
            self.cells[[z, y + 1, x]],
            self.cells[[z - 1, y, x]],
            self.cells[[z + 1, y, x]],
        ]
    }

    /// Copy of the map without the sentinel shell
    pub fn interior(&self) -> Array3<StructureId> {
        let (pz, py, px) = self.cells.dim();
        self.cells
            .slice(s![1..pz - 1, 1..py - 1, 1..px - 1])
            .to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_reads_return_background() {
        let mut map = IndexMap::new(1, 2, 3);
        map.set(&Vec3u::new(0, 0, 0), 7);

        // every neighbour of the corner voxel is either unassigned or
        // outside the cube
        assert_eq!(map.neighbours(&Vec3u::new(0, 0, 0)), [0; 6]);
        assert_eq!(map.neighbours(&Vec3u::new(1, 0, 0)), [7, 0, 0, 0, 0, 0]);
        assert_eq!(map.neighbours(&Vec3u::new(2, 1, 0)), [0; 6]);
    }

    #[test]
    fn test_get_set() {
        let mut map = IndexMap::new(2, 2, 2);
        let v = Vec3u::new(1, 0, 1);

        assert_eq!(map.get(&v), 0);
        map.set(&v, 3);
        assert_eq!(map.get(&v), 3);
    }

    #[test]
    fn test_interior_strips_sentinels() {
        let mut map = IndexMap::new(1, 2, 2);
        map.set(&Vec3u::new(0, 1, 0), 5);

        let interior = map.interior();
        assert_eq!(interior.dim(), (1, 2, 2));
        assert_eq!(interior[[0, 1, 0]], 5);
        assert_eq!(interior.iter().filter(|&&id| id != 0).count(), 1);
    }
}
