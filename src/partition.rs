//! Splitting the volume into chunks which fit into the memory of the
//! available accelerators, and finding the band of detector rows each chunk
//! needs.
//!
//! The volume is cut along `z` into `N` bands of equal depth (the last one
//! also takes whatever is left over when `dim_z` is not divisible by `N`).
//! Each device claims a contiguous run of bands, in device order. How many
//! bands a device claims depends on its memory: starting from an even share
//! of the volume, the share is halved until a chunk fits on the device, so a
//! device with less memory ends up with more, smaller chunks.
//!
//! Everything is computed eagerly by `Partition::new`; afterwards the
//! partition is read-only and can be shared between threads freely.

use geometry::{DetectorGeometry, VolumeGeometry};
use itertools::Itertools;
use units::{mm_, todo::Lengthf32, Length};

use crate::device::{Accelerator, DeviceError};
use crate::utils::group_digits;

#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("no accelerator devices found")]
    NoDevices,

    #[error("the volume contains no voxels")]
    EmptyVolume,

    #[error("device #{device} reports no memory")]
    ZeroMemory { device: usize },

    #[error("volume would need {chunks} chunks but has only {dim_z} slices: a single slice does not fit in device memory")]
    TooManyChunks { chunks: u64, dim_z: u32 },
}

/// One chunk of the volume, as assigned to a device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkAssignment {
    pub device: usize,
    /// Position of this chunk among the chunks of its device
    pub index: u32,
    /// First slice of the chunk in the whole volume
    pub offset: u32,
    /// Number of slices in the chunk
    pub depth: u32,
    pub bytes: u64,
    /// First and last (inclusive) detector rows needed to reconstruct this chunk
    pub rows: (u32, u32),
    /// Same as `rows.0`; the row at which the sub-projection starts
    pub row_offset: u32,
}

impl ChunkAssignment {
    /// Number of detector rows in the sub-projection. A band whose end lies
    /// before its start counts as a single row.
    pub fn rows_len(&self) -> u32 { self.rows.1.saturating_sub(self.rows.0).saturating_add(1) }

    /// Slices covered by this chunk
    pub fn slices(&self) -> std::ops::Range<u32> { self.offset..self.offset + self.depth }
}

/// Per-device chunk assignments of a volume.
///
/// Construct once per run and share (e.g. via `Arc`) with every stage that
/// needs it. All queries are infallible: asking about a device or chunk which
/// does not exist gives zero (or `(0, 0)`).
#[derive(Clone, Debug)]
pub struct Partition {
    volume: VolumeGeometry,
    voxel_bytes: usize,
    memories: Vec<u64>,
    /// Indexed by device, then by chunk index within the device
    chunks: Vec<Vec<ChunkAssignment>>,
}

impl Partition {

    /// Partition `volume`, made of voxels of type `T`, over the devices of
    /// `accelerator`.
    pub fn new<T, A>(volume: VolumeGeometry, detector: &DetectorGeometry, accelerator: &A) -> Result<Self, PartitionError>
    where
        A: Accelerator + ?Sized,
    {
        Self::with_voxel_bytes(volume, detector, std::mem::size_of::<T>(), accelerator)
    }

    pub fn with_voxel_bytes<A>(volume: VolumeGeometry, detector: &DetectorGeometry, voxel_bytes: usize, accelerator: &A) -> Result<Self, PartitionError>
    where
        A: Accelerator + ?Sized,
    {
        let n_devices = accelerator.device_count()?;
        if n_devices == 0 { return Err(PartitionError::NoDevices) }

        let volume_bytes = volume.bytes_with_voxel_size(voxel_bytes);
        if volume_bytes == 0 { return Err(PartitionError::EmptyVolume) }
        log::info!("Volume is {:.2} mm high and needs {} bytes", mm_(volume.height()), group_digits(volume_bytes));

        let memories = (0..n_devices)
            .map(|device| accelerator.total_memory(device))
            .collect::<Result<Vec<_>, _>>()?;

        let counts = chunks_per_device(&volume, voxel_bytes, &memories)?;
        let layout = depth_layout(volume.dim_z, &counts);

        let mut chunks: Vec<Vec<ChunkAssignment>> = counts.iter().map(|&n| Vec::with_capacity(n as usize)).collect();
        for (device, index, offset, depth) in layout {
            let rows = subprojection_rows(detector, &volume, offset, depth);
            chunks[device].push(ChunkAssignment {
                device, index, offset, depth,
                bytes: depth as u64 * volume.slice_bytes(voxel_bytes),
                rows,
                row_offset: rows.0,
            });
        }

        for (device, device_chunks) in chunks.iter().enumerate() {
            log::debug!("Device #{device} will process the following subprojection(s): {}",
                        device_chunks.iter().map(|c| format!("({},{})", c.rows.0, c.rows.1)).join(" "));
        }

        Ok(Self { volume, voxel_bytes, memories, chunks })
    }

    pub fn volume_geometry(&self) -> VolumeGeometry { self.volume }

    pub fn volume_height(&self) -> Length { self.volume.height() }

    pub fn voxel_bytes(&self) -> usize { self.voxel_bytes }

    pub fn device_count(&self) -> usize { self.chunks.len() }

    /// Memory reported by `device` when the partition was made
    pub fn device_memory(&self, device: usize) -> u64 {
        self.memories.get(device).copied().unwrap_or(0)
    }

    /// Number of chunks over all devices
    pub fn total_chunks(&self) -> u32 { self.chunks.iter().map(|c| c.len() as u32).sum() }

    pub fn chunk_count(&self, device: usize) -> u32 {
        self.chunks.get(device).map_or(0, |c| c.len() as u32)
    }

    /// There is one sub-projection per chunk
    pub fn subproj_count(&self, device: usize) -> u32 { self.chunk_count(device) }

    pub fn assignment(&self, device: usize, index: u32) -> Option<&ChunkAssignment> {
        self.chunks.get(device)?.get(index as usize)
    }

    /// First slice of chunk `index` on `device`
    pub fn volume_offset(&self, device: usize, index: u32) -> u32 {
        self.assignment(device, index).map_or(0, |c| c.offset)
    }

    /// Number of slices in chunk `index` on `device`
    pub fn volume_depth(&self, device: usize, index: u32) -> u32 {
        self.assignment(device, index).map_or(0, |c| c.depth)
    }

    pub fn chunk_bytes(&self, device: usize, index: u32) -> u64 {
        self.assignment(device, index).map_or(0, |c| c.bytes)
    }

    /// First and last (inclusive) detector rows needed by chunk `index` on `device`
    pub fn subproj_rows(&self, device: usize, index: u32) -> (u32, u32) {
        self.assignment(device, index).map_or((0, 0), |c| c.rows)
    }

    pub fn subproj_offset(&self, device: usize, index: u32) -> u32 {
        self.assignment(device, index).map_or(0, |c| c.row_offset)
    }

    /// Chunks of `device`, in the order they are to be processed
    pub fn chunks(&self, device: usize) -> impl Iterator<Item = &ChunkAssignment> + '_ {
        self.chunks.get(device).into_iter().flatten()
    }

    /// All chunks, ordered by device, then by index within the device. This
    /// is also the order of their slices in the volume.
    pub fn all_chunks(&self) -> impl Iterator<Item = &ChunkAssignment> + '_ {
        self.chunks.iter().flatten()
    }
}

/// Number of chunks each device needs so that every one of its chunks fits
/// into its memory.
fn chunks_per_device(volume: &VolumeGeometry, voxel_bytes: usize, memories: &[u64]) -> Result<Vec<u64>, PartitionError> {
    let dim_z = volume.dim_z;
    let share = volume.bytes_with_voxel_size(voxel_bytes) / memories.len() as u64;

    let mut counts = memories.iter().enumerate()
        .map(|(device, &memory)| -> Result<u64, PartitionError> {
            if memory == 0 { return Err(PartitionError::ZeroMemory { device }) }
            let (count, size) = halve_until_fits(share, memory, dim_z)?;
            let chunk_str = if count > 1 { "chunks" } else { "chunk" };
            log::info!("Need {count} {chunk_str} with {} bytes on device #{device}", group_digits(size));
            Ok(count)
        })
        .collect::<Result<Vec<_>, PartitionError>>()?;

    // Bands are equal across *all* chunks, not per device: with unequal chunk
    // counts a band can exceed the halved share. Keep halving until the
    // actual bands fit.
    let slice_bytes = volume.slice_bytes(voxel_bytes);
    loop {
        let total: u64 = counts.iter().sum();
        if total > dim_z as u64 {
            return Err(PartitionError::TooManyChunks { chunks: total, dim_z })
        }
        let band = dim_z as u64 / total;
        let remainder = dim_z as u64 % total;
        let last = counts.len() - 1;

        let mut refined = false;
        for (device, (count, &memory)) in counts.iter_mut().zip(memories).enumerate() {
            let largest = if device == last { band + remainder } else { band };
            if largest * slice_bytes >= memory {
                log::debug!("Chunks of {} bytes do not fit on device #{device}: splitting further",
                            group_digits(largest * slice_bytes));
                *count *= 2;
                refined = true;
            }
        }
        if !refined { return Ok(counts) }
    }
}

/// Halve `size` (doubling the chunk count) until it is strictly smaller than
/// `memory`. Returns the chunk count and the final chunk size.
fn halve_until_fits(mut size: u64, memory: u64, dim_z: u32) -> Result<(u64, u64), PartitionError> {
    let mut count = 1;
    while size >= memory {
        size /= 2;
        count *= 2;
        if count > dim_z as u64 { return Err(PartitionError::TooManyChunks { chunks: count, dim_z }) }
    }
    Ok((count, size))
}

/// `(device, index, offset, depth)` of every chunk, in device-then-index
/// order. Offsets are a running sum over all chunks of all preceding
/// devices, so devices with different chunk counts never overlap. The final
/// chunk absorbs the slices left over by integer division.
fn depth_layout(dim_z: u32, counts: &[u64]) -> Vec<(usize, u32, u32, u32)> {
    let total: u64 = counts.iter().sum();
    let band = (dim_z as u64 / total) as u32;
    let remainder = (dim_z as u64 % total) as u32;

    let mut layout = Vec::with_capacity(total as usize);
    let mut offset = 0;
    for (device, &count) in counts.iter().enumerate() {
        for index in 0..count as u32 {
            let is_last = layout.len() as u64 == total - 1;
            let depth = if is_last { band + remainder } else { band };
            layout.push((device, index, offset, depth));
            offset += depth;
        }
    }
    layout
}

/// Detector rows whose data is needed to reconstruct the slices
/// `offset..offset+depth` of `volume`.
///
/// The top and bottom planes of the chunk are projected onto the detector
/// through the edge of the volume which magnifies them most (nearest the
/// source), clamped to the centres of the outermost detector rows, and
/// converted to row indices, rounding outwards.
pub fn subprojection_rows(detector: &DetectorGeometry, volume: &VolumeGeometry, offset: u32, depth: u32) -> (u32, u32) {
    if detector.n_col == 0 { return (0, 0) }

    let height: Lengthf32 = mm_(volume.height());
    let l_vx_z: Lengthf32 = mm_(volume.l_vx_z);
    let r_max : Lengthf32 = mm_(volume.max_radius());
    let d_so  : Lengthf32 = mm_(detector.d_so).abs();
    let d_sd  : Lengthf32 = mm_(detector.d_sd());

    let n_col = detector.n_col as f32;
    let l_px  : Lengthf32 = mm_(detector.l_px_col);
    let delta_t: Lengthf32 = detector.delta_t * l_px; // signed, unlike in the volume geometry

    // z-planes bounding the chunk; the volume is centred on z = 0
    let top   : Lengthf32 = -(height / 2.0) + offset as f32 * l_vx_z;
    let bottom: Lengthf32 = top + depth as f32 * l_vx_z;

    let top_proj_virt    = top    * d_sd / (d_so + if top    < 0.0 { -r_max } else {  r_max });
    let bottom_proj_virt = bottom * d_sd / (d_so + if bottom < 0.0 {  r_max } else { -r_max });

    // Centres of first and last detector rows
    let first_row: Lengthf32 = -(n_col * l_px) / 2.0 - delta_t + l_px / 2.0;
    let last_row : Lengthf32 = first_row + n_col * l_px - l_px;

    let top_proj    =    top_proj_virt.max(first_row).min(last_row);
    let bottom_proj = bottom_proj_virt.max(first_row).min(last_row);

    let to_row = |z: Lengthf32| (z + (n_col * l_px) / 2.0 + delta_t) / l_px - 0.5;
    let start_row = to_row(top_proj).floor();
    let end_row   = to_row(bottom_proj).ceil();

    let max_row = n_col - 1.0;
    let start = start_row.max(0.0).min(max_row) as u32;
    let end   =   end_row.max(0.0).min(max_row) as u32;

    log::debug!("(offset, depth) = ({offset}, {depth})");
    log::debug!("(top, bottom) = ({top}, {bottom})");
    log::debug!("(top_proj_virt, bottom_proj_virt) = ({top_proj_virt}, {bottom_proj_virt})");
    log::debug!("(top_proj_real, bottom_proj_real) = ({first_row}, {last_row})");
    log::debug!("(top_proj, bottom_proj) = ({top_proj}, {bottom_proj})");
    log::debug!("(start_row, end_row) = ({start}, {end})");

    (start, end.max(start))
}
