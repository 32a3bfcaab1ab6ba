use super::{ReadError, WriteError};
use crate::{
    dendrogram::{
        newick::{parse_newick, NewickNode},
        Dendrogram, Structure, StructureId, Voxel,
    },
    helpers::aliases::Vec3u,
    traits::FluxValue,
};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use ndarray::Array3;
use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

/// Container layout, all integers little endian:
/// - magic `DGRM`, format version (u16), `n_dim` (u8), stored 3D shape
///   `nz, ny, nx` (3 x u64; a 2D dendrogram stores `nz = 1`);
/// - four length-prefixed zlib sections: the Newick string (UTF-8), the
///   flux cube (f64 per voxel, row-major), the index map (u32), and the
///   item type map (u8).
const MAGIC: &[u8; 4] = b"DGRM";
const VERSION: u16 = 1;

#[derive(Default)]
pub struct ContainerWriter;

impl ContainerWriter {
    pub fn write_to_buffer<TBuffer, T>(
        &self,
        dendrogram: &Dendrogram<T>,
        writer: &mut BufWriter<TBuffer>,
    ) -> Result<(), WriteError>
    where
        TBuffer: Write,
        T: FluxValue,
    {
        let shape = dendrogram.index_map().shape();
        let (nz, ny, nx) = match *shape {
            [ny, nx] => (1, ny, nx),
            [nz, ny, nx] => (nz, ny, nx),
            _ => unreachable!("maps are 2D or 3D"),
        };

        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&[dendrogram.n_dim() as u8])?;
        for extent in [nz, ny, nx] {
            writer.write_all(&(extent as u64).to_le_bytes())?;
        }

        write_section(writer, dendrogram.to_newick().as_bytes())?;

        let mut flux = Vec::with_capacity(dendrogram.data().len() * 8);
        for value in dendrogram.data().iter() {
            flux.extend_from_slice(&num_traits::cast::<T, f64>(*value).unwrap().to_le_bytes());
        }
        write_section(writer, &flux)?;

        let mut ids = Vec::with_capacity(dendrogram.index_map().len() * 4);
        for id in dendrogram.index_map().iter() {
            ids.extend_from_slice(&id.to_le_bytes());
        }
        write_section(writer, &ids)?;

        let types: Vec<u8> = dendrogram.item_type_map().iter().copied().collect();
        write_section(writer, &types)?;

        writer.flush()?;
        Ok(())
    }

    pub fn write_to_file<T: FluxValue>(
        &self,
        dendrogram: &Dendrogram<T>,
        path: &Path,
    ) -> Result<(), WriteError> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);

        self.write_to_buffer(dendrogram, &mut writer)
    }
}

#[derive(Default)]
pub struct ContainerReader;

impl ContainerReader {
    pub fn read_from_buffer<TBuffer, T>(
        &self,
        reader: &mut BufReader<TBuffer>,
    ) -> Result<Dendrogram<T>, ReadError>
    where
        TBuffer: Read,
        T: FluxValue,
    {
        let magic: [u8; 4] = read_array(reader)?;
        if &magic != MAGIC {
            return Err(ReadError::NotAContainer);
        }

        let version = u16::from_le_bytes(read_array(reader)?);
        if version != VERSION {
            return Err(ReadError::UnsupportedVersion(version));
        }

        let n_dim = read_array::<TBuffer, 1>(reader)?[0] as usize;
        let nz = u64::from_le_bytes(read_array(reader)?) as usize;
        let ny = u64::from_le_bytes(read_array(reader)?) as usize;
        let nx = u64::from_le_bytes(read_array(reader)?) as usize;

        if !matches!(n_dim, 2 | 3) || (n_dim == 2 && nz != 1) {
            return Err(ReadError::Malformed);
        }
        let nvox = nz
            .checked_mul(ny)
            .and_then(|a| a.checked_mul(nx))
            .ok_or(ReadError::Malformed)?;

        // per-section payload bounds; a shape whose byte size overflows
        // cannot be stored in the first place
        let newick_bound = nvox
            .checked_mul(64)
            .and_then(|n| n.checked_add(16))
            .ok_or(ReadError::Malformed)?;
        let flux_bound = nvox.checked_mul(8).ok_or(ReadError::Malformed)?;
        let ids_bound = nvox.checked_mul(4).ok_or(ReadError::Malformed)?;

        let newick = String::from_utf8(read_section(reader, newick_bound)?)
            .map_err(|_| ReadError::Malformed)?;

        let flux = read_section(reader, flux_bound)?;
        if flux.len() != flux_bound {
            return Err(ReadError::Malformed);
        }
        let values: Vec<T> = flux
            .chunks_exact(8)
            .map(|chunk| {
                let value = f64::from_le_bytes(chunk.try_into().unwrap());
                num_traits::cast::<f64, T>(value).ok_or(ReadError::Malformed)
            })
            .collect::<Result<_, _>>()?;
        let data = Array3::from_shape_vec((nz, ny, nx), values).map_err(|_| ReadError::Malformed)?;

        let ids = read_section(reader, ids_bound)?;
        if ids.len() != ids_bound {
            return Err(ReadError::Malformed);
        }
        let ids: Vec<StructureId> = ids
            .chunks_exact(4)
            .map(|chunk| StructureId::from_le_bytes(chunk.try_into().unwrap()))
            .collect();
        let index_map = Array3::from_shape_vec((nz, ny, nx), ids).map_err(|_| ReadError::Malformed)?;

        let types = read_section(reader, nvox)?;
        let item_type_map =
            Array3::from_shape_vec((nz, ny, nx), types).map_err(|_| ReadError::Malformed)?;

        let trunk = reconstruct_trunk(&parse_newick(&newick)?, &index_map, &data)?;

        // re-cast to the stored dimensionality
        let (data, index_map, item_type_map) = if n_dim == 2 {
            (
                data.into_shape((ny, nx))
                    .map_err(|_| ReadError::Malformed)?
                    .into_dyn(),
                index_map
                    .into_shape((ny, nx))
                    .map_err(|_| ReadError::Malformed)?
                    .into_dyn(),
                item_type_map
                    .into_shape((ny, nx))
                    .map_err(|_| ReadError::Malformed)?
                    .into_dyn(),
            )
        } else {
            (
                data.into_dyn(),
                index_map.into_dyn(),
                item_type_map.into_dyn(),
            )
        };

        Ok(Dendrogram::from_parts(data, trunk, index_map, item_type_map))
    }

    pub fn read_from_file<T: FluxValue>(&self, path: &Path) -> Result<Dendrogram<T>, ReadError> {
        let file = OpenOptions::new().read(true).open(path)?;
        let mut reader = BufReader::new(file);

        self.read_from_buffer::<File, T>(&mut reader)
    }
}

fn write_section<TBuffer: Write>(
    writer: &mut BufWriter<TBuffer>,
    payload: &[u8],
) -> Result<(), WriteError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload)?;
    let compressed = encoder.finish()?;

    writer.write_all(&(compressed.len() as u64).to_le_bytes())?;
    writer.write_all(&compressed)?;
    Ok(())
}

/// Reads one length-prefixed zlib section. The length prefix comes
/// straight from the stream, so it is checked against the payload bound
/// before anything is allocated; a truncated stream stops the read at
/// the actual end of input instead of sizing a buffer up front.
fn read_section<TBuffer: Read>(
    reader: &mut BufReader<TBuffer>,
    max_payload: usize,
) -> Result<Vec<u8>, ReadError> {
    let len = u64::from_le_bytes(read_array(reader)?) as usize;

    // incompressible data grows slightly under zlib
    let max_compressed = max_payload
        .saturating_add(max_payload / 1000)
        .saturating_add(64);
    if len > max_compressed {
        return Err(ReadError::Malformed);
    }

    let mut compressed = Vec::new();
    reader
        .by_ref()
        .take(len as u64)
        .read_to_end(&mut compressed)?;
    if compressed.len() != len {
        return Err(ReadError::Malformed);
    }

    let mut payload = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .take((max_payload as u64).saturating_add(1))
        .read_to_end(&mut payload)
        .map_err(|_| ReadError::Malformed)?;
    if payload.len() > max_payload {
        return Err(ReadError::Malformed);
    }
    Ok(payload)
}

fn read_array<TBuffer: Read, const SIZE: usize>(
    reader: &mut BufReader<TBuffer>,
) -> Result<[u8; SIZE], ReadError> {
    let mut bytes = [0; SIZE];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

/// Rebuilds the structure tree from the parsed Newick nesting: every id
/// gathers its footprint from the index map in row-major order, the
/// first voxel seeds the structure and the rest are appended. Ids
/// stamped in the map but absent from the Newick string belong to
/// pruned structures and are ignored.
fn reconstruct_trunk<T: FluxValue>(
    nodes: &[NewickNode],
    index_map: &Array3<StructureId>,
    data: &Array3<T>,
) -> Result<Vec<Structure<T>>, ReadError> {
    let mut footprints: HashMap<StructureId, Vec<Voxel<T>>> = HashMap::new();
    for ((z, y, x), &id) in index_map.indexed_iter() {
        if id != 0 {
            footprints.entry(id).or_default().push(Voxel {
                pos: Vec3u::new(x, y, z),
                flux: data[[z, y, x]],
            });
        }
    }

    nodes
        .iter()
        .map(|node| build_structure(node, &mut footprints))
        .collect()
}

fn build_structure<T: FluxValue>(
    node: &NewickNode,
    footprints: &mut HashMap<StructureId, Vec<Voxel<T>>>,
) -> Result<Structure<T>, ReadError> {
    let voxels = footprints.remove(&node.id).ok_or(ReadError::Malformed)?;
    let mut voxels = voxels.into_iter();
    let seed = voxels.next().ok_or(ReadError::Malformed)?;

    let mut structure = if node.children.is_empty() {
        Structure::leaf(node.id, seed.pos, seed.flux)
    } else {
        if node.children.len() < 2 {
            return Err(ReadError::Malformed);
        }

        let children: Vec<Structure<T>> = node
            .children
            .iter()
            .map(|child| build_structure(child, footprints))
            .collect::<Result<_, _>>()?;
        Structure::branch(node.id, children, seed.pos, seed.flux)
    };

    for voxel in voxels {
        structure.add_voxel(voxel.pos, voxel.flux);
    }

    Ok(structure)
}
