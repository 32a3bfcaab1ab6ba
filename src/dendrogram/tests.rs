use super::newick::parse_newick;
use super::*;
use crate::helpers::aliases::Vec3u;
use ndarray::{Array1, Array2, Array3, ArrayD};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashSet;
use test_case::test_case;

#[test]
fn test_two_peaks_merge_into_branch() {
    let data = row(&[1.0, 2.0, 3.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0]);
    let dendrogram = DendrogramBuilder::new()
        .min_flux(0.0)
        .min_npix(1)
        .compute(data)
        .expect("valid input");

    assert_eq!(dendrogram.trunk().len(), 1);

    let root = &dendrogram.trunk()[0];
    assert!(!root.is_leaf());
    assert_eq!(root.seed().pos, Vec3u::new(4, 0, 0));
    assert_eq!(root.seed().flux, 1.0);

    assert_eq!(root.children().len(), 2);
    assert!(root.children().iter().all(|c| c.is_leaf()));
    let peaks: Vec<usize> = root.children().iter().map(|c| c.seed().pos.x).collect();
    assert_eq!(peaks, vec![2, 6]);
}

#[test]
fn test_shallow_peaks_collapse_at_saddle() {
    // Both peaks rise 2 above the saddle, less than min_delta, so the
    // merge collapses them into the lower-id leaf. That orphan then
    // fails the prominence test itself and is pruned.
    let data = row(&[1.0, 2.0, 3.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0]);
    let dendrogram = DendrogramBuilder::new()
        .min_flux(0.0)
        .min_npix(1)
        .min_delta(3.0)
        .compute(data)
        .expect("valid input");

    assert!(dendrogram.trunk().is_empty());

    // the collapse is still visible in the stale index map entries,
    // which all carry the reference leaf's id
    let ids: HashSet<StructureId> = dendrogram
        .index_map()
        .iter()
        .copied()
        .filter(|&id| id != 0)
        .collect();
    assert_eq!(ids, HashSet::from([1]));
}

#[test]
fn test_small_leaves_collapse_into_surviving_leaf() {
    // Same shape, with the size test doing the absorbing; the merged
    // leaf is large enough to survive the post pass.
    let data = row(&[1.0, 2.0, 3.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0]);
    let dendrogram = DendrogramBuilder::new()
        .min_flux(0.0)
        .min_npix(5)
        .compute(data)
        .expect("valid input");

    assert_eq!(dendrogram.trunk().len(), 1);

    let root = &dendrogram.trunk()[0];
    assert!(root.is_leaf());
    assert_eq!(root.npix(), 9);
}

#[test]
fn test_branch_seeded_at_saddle() {
    let data = row(&[5.0, 4.0, 3.0, 4.0, 5.0]);
    let dendrogram = DendrogramBuilder::new()
        .min_flux(0.0)
        .compute(data)
        .expect("valid input");

    assert_eq!(dendrogram.trunk().len(), 1);

    let root = &dendrogram.trunk()[0];
    assert_eq!(root.children().len(), 2);
    assert_eq!(root.seed().pos.x, 2);
    assert_eq!(root.seed().flux, 3.0);
}

#[test]
fn test_flat_plateau_forms_single_leaf() {
    // ties resolve by linear index, so each voxel connects to the
    // previous one
    let data = row(&[3.0, 3.0, 3.0]);
    let dendrogram = DendrogramBuilder::new()
        .min_flux(0.0)
        .compute(data)
        .expect("valid input");

    assert_eq!(dendrogram.trunk().len(), 1);

    let root = &dendrogram.trunk()[0];
    assert!(root.is_leaf());
    assert_eq!(root.npix(), 3);
    assert_eq!(root.seed().pos.x, 0);
}

#[test_case(2, 0.0 ; "absorbed by the size test")]
#[test_case(0, 0.5 ; "absorbed by the prominence test")]
fn test_single_peak_image_collapses(min_npix: usize, min_delta: f64) {
    let data = Array2::from_shape_vec(
        (3, 3),
        vec![1.0, 1.0, 1.0, 1.0, 9.0, 1.0, 1.0, 1.0, 1.0],
    )
    .expect("shape matches")
    .into_dyn();

    let dendrogram = DendrogramBuilder::new()
        .min_npix(min_npix)
        .min_delta(min_delta)
        .compute(data)
        .expect("valid input");

    assert_eq!(dendrogram.n_dim(), 2);
    assert_eq!(dendrogram.trunk().len(), 1);

    let root = &dendrogram.trunk()[0];
    assert!(root.is_leaf());
    assert_eq!(root.npix(), 9);

    // output maps keep the input dimensionality
    assert_eq!(dendrogram.index_map().shape(), &[3, 3]);
    assert!(dendrogram.index_map().iter().all(|&id| id == root.id()));
    assert!(dendrogram.item_type_map().iter().all(|&t| t == TYPE_LEAF));
}

#[test]
fn test_disjoint_peaks_stay_separate_roots() {
    let data = row(&[5.0, 4.0, 0.0, 4.0, 5.0]);
    let dendrogram = DendrogramBuilder::new()
        .min_flux(0.0)
        .compute(data)
        .expect("valid input");

    assert_eq!(dendrogram.trunk().len(), 2);
    assert!(dendrogram.trunk().iter().all(|root| root.is_leaf()));

    // trunk is ordered by creation id
    let ids: Vec<StructureId> = dendrogram.trunk().iter().map(|root| root.id()).collect();
    assert_eq!(ids, vec![1, 2]);

    // the band below min_flux stays background
    assert_eq!(dendrogram.index_map()[[0, 0, 2]], 0);
}

#[test]
fn test_all_background_gives_empty_dendrogram() {
    let data = row(&[0.1, 0.2, 0.3]);
    let dendrogram = DendrogramBuilder::new()
        .min_flux(1.0)
        .compute(data)
        .expect("valid input");

    assert!(dendrogram.trunk().is_empty());
    assert!(dendrogram.leaves().is_empty());
    assert!(dendrogram.index_map().iter().all(|&id| id == 0));
    assert!(dendrogram.item_type_map().iter().all(|&t| t == 0));
    assert_eq!(dendrogram.to_newick(), "();");
}

#[test]
fn test_zero_thresholds_keep_every_local_maximum() {
    let data = row(&[1.0, 2.0, 3.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0]);
    let dendrogram = Dendrogram::compute(data).expect("valid input");

    assert_eq!(dendrogram.leaves().len(), 2);
}

#[test]
fn test_infinite_min_delta_collapses_every_merge() {
    let data = row(&[1.0, 2.0, 3.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0]);
    let dendrogram = DendrogramBuilder::new()
        .min_flux(0.0)
        .min_delta(f64::INFINITY)
        .compute(data)
        .expect("valid input");

    // everything collapsed into one leaf, which then fails the
    // unbounded prominence test itself
    assert!(dendrogram.trunk().is_empty());

    let ids: HashSet<StructureId> = dendrogram
        .index_map()
        .iter()
        .copied()
        .filter(|&id| id != 0)
        .collect();
    assert_eq!(ids.len(), 1);
}

#[test]
fn test_invalid_dimensionality() {
    let data = Array1::from_vec(vec![1.0, 2.0]).into_dyn();

    assert_eq!(
        Dendrogram::compute(data).err(),
        Some(ComputeError::InvalidDimensionality(1))
    );
}

#[test]
fn test_invalid_thresholds() {
    let data = row(&[1.0, 2.0]);

    assert_eq!(
        DendrogramBuilder::new()
            .min_delta(-1.0)
            .compute(data.clone())
            .err(),
        Some(ComputeError::InvalidThreshold)
    );
    assert_eq!(
        DendrogramBuilder::new().min_flux(f64::NAN).compute(data).err(),
        Some(ComputeError::InvalidThreshold)
    );
}

#[test]
fn test_newick_round_trip_preserves_topology() {
    let dendrogram = random_dendrogram();
    let parsed = parse_newick(&dendrogram.to_newick()).expect("own output parses");

    assert_eq!(parsed.len(), dendrogram.trunk().len());
    for (node, root) in parsed.iter().zip(dendrogram.trunk()) {
        assert_topology_matches(node, root);
    }
}

#[test]
fn test_compute_is_deterministic() {
    let first = random_dendrogram();
    let second = random_dendrogram();

    assert_eq!(first.to_newick(), second.to_newick());
    assert_eq!(first.index_map(), second.index_map());
    assert_eq!(first.item_type_map(), second.item_type_map());
}

#[test]
fn test_invariants_on_random_cube() {
    let dendrogram = random_dendrogram();
    assert!(!dendrogram.trunk().is_empty());

    let mut owned = HashSet::new();
    for root in dendrogram.trunk() {
        for_each_structure(root, &mut |structure| {
            if !structure.is_leaf() {
                assert!(structure.children().len() >= 2);
                for child in structure.children() {
                    assert!(structure.fmax() >= child.fmax());
                    assert!(structure.seed().flux <= child.fmin());
                }
            }

            // own footprint matches the index map exactly
            let stamped = dendrogram
                .index_map()
                .iter()
                .filter(|&&id| id == structure.id())
                .count();
            assert_eq!(stamped, structure.voxels().len());

            for voxel in structure.voxels() {
                let pos = voxel.pos;
                assert_eq!(
                    dendrogram.index_map()[[pos.z, pos.y, pos.x]],
                    structure.id()
                );
                assert!(owned.insert((pos.x, pos.y, pos.z)), "voxel owned twice");
            }
        });
    }
}

fn row(values: &[f64]) -> ArrayD<f64> {
    Array3::from_shape_vec((1, 1, values.len()), values.to_vec())
        .expect("shape matches")
        .into_dyn()
}

fn random_dendrogram() -> Dendrogram<f64> {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut rng = StdRng::seed_from_u64(42);
    let values: Vec<f64> = (0..6 * 6 * 6).map(|_| rng.gen()).collect();
    let data = Array3::from_shape_vec((6, 6, 6), values)
        .expect("shape matches")
        .into_dyn();

    DendrogramBuilder::new()
        .min_flux(0.2)
        .min_npix(2)
        .min_delta(0.05)
        .compute(data)
        .expect("valid input")
}

fn for_each_structure<'a>(root: &'a Structure<f64>, f: &mut impl FnMut(&'a Structure<f64>)) {
    f(root);
    for child in root.children() {
        for_each_structure(child, f);
    }
}

fn assert_topology_matches(node: &newick::NewickNode, structure: &Structure<f64>) {
    assert_eq!(node.id, structure.id());
    assert_eq!(node.children.len(), structure.children().len());
    for (child_node, child) in node.children.iter().zip(structure.children()) {
        assert_topology_matches(child_node, child);
    }
}
