use super::aliases::Vec3u;

/// Converts a row-major linear index over a `(nz, ny, nx)` cube back to
/// a voxel coordinate
#[inline]
pub fn unravel_index(index: usize, ny: usize, nx: usize) -> Vec3u {
    let z = index / (ny * nx);
    let rem = index % (ny * nx);

    Vec3u::new(rem % nx, rem / nx, z)
}
