pub use geometry::{
    DetectorGeometry, VolumeGeometry, RegionOfInterest,
    derive_volume_geometry, apply_region_of_interest, apply_roi,
};

pub use units::{Information, Length};

pub use crate::device::{Accelerator, DeviceError, HostAccelerator};
pub use crate::image::{DeviceImage, HostImage};
pub use crate::partition::{ChunkAssignment, Partition, PartitionError};
pub use crate::pipeline::{Item, PipelineError};
