use units::mm_;

use crate::VolumeGeometry;

/// Voxel coordinate bounds of the part of the volume to be reconstructed,
/// as `(low, high)` pairs along each axis
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionOfInterest {
    pub x: (u32, u32),
    pub y: (u32, u32),
    pub z: (u32, u32),
}

impl RegionOfInterest {
    pub fn new(x: (u32, u32), y: (u32, u32), z: (u32, u32)) -> Self { Self { x, y, z } }

    /// Number of voxels spanned along each axis, or `None` if some `low` is
    /// not strictly below its `high`. A bound starting at voxel 0 includes
    /// voxel 0, which widens its span by one.
    fn spans(&self) -> Option<(u32, u32, u32)> {
        fn span((low, high): (u32, u32)) -> Option<u32> {
            if low >= high { return None }
            let span = high - low;
            Some(if low == 0 { span.saturating_add(1) } else { span })
        }
        Some((span(self.x)?, span(self.y)?, span(self.z)?))
    }
}

/// Shrink `vol` to `roi`.
///
/// Best effort: if `roi` is malformed or would grow the volume along any axis,
/// a warning is logged and `vol` is returned unchanged.
pub fn apply_region_of_interest(vol: &VolumeGeometry, roi: &RegionOfInterest) -> VolumeGeometry {
    let Some((dim_x, dim_y, dim_z)) = roi.spans() else {
        log::warn!("Invalid ROI coordinates {roi:?}. ROI NOT applied.");
        return *vol;
    };

    if dim_x > vol.dim_x || dim_y > vol.dim_y || dim_z > vol.dim_z {
        log::warn!("New volume dimensions {dim_x} x {dim_y} x {dim_z} exceed old volume dimensions \
                    {} x {} x {}. ROI NOT applied.", vol.dim_x, vol.dim_y, vol.dim_z);
        return *vol;
    }

    let roi_vol = VolumeGeometry { dim_x, dim_y, dim_z, ..*vol };
    let (x, y, z) = roi_vol.extent();
    log::info!("Applied region of interest.");
    log::info!("Updated volume dimensions [vx]: {dim_x} x {dim_y} x {dim_z}");
    log::info!("Updated volume dimensions [mm]: {:.2} x {:.2} x {:.2}", mm_(x), mm_(y), mm_(z));
    roi_vol
}

/// Positional form of `apply_region_of_interest`
pub fn apply_roi(vol: &VolumeGeometry,
                 x1: u32, x2: u32,
                 y1: u32, y2: u32,
                 z1: u32, z2: u32,
) -> VolumeGeometry {
    apply_region_of_interest(vol, &RegionOfInterest::new((x1, x2), (y1, y2), (z1, z2)))
}
