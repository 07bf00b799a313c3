//! Cone-beam geometry: the detector as configured, and the voxel volume it
//! can reconstruct.

mod detector;
mod volume;
mod roi;

pub use detector::DetectorGeometry;
pub use volume::{VolumeGeometry, derive_volume_geometry};
pub use roi::{RegionOfInterest, apply_region_of_interest, apply_roi};
