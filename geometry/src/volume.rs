use units::{mm_, ratio_, Angle, Length, Ratio};

use crate::DetectorGeometry;

/// The voxel grid of the reconstructed volume
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeGeometry {
    pub dim_x: u32,
    pub dim_y: u32,
    pub dim_z: u32,

    /// Voxel edge lengths
    pub l_vx_x: Length,
    pub l_vx_y: Length,
    pub l_vx_z: Length,
}

impl VolumeGeometry {

    pub fn n_voxels(&self) -> u64 {
        self.dim_x as u64 * self.dim_y as u64 * self.dim_z as u64
    }

    /// Bytes needed to hold the whole volume with voxels of type `T`
    pub fn bytes<T>(&self) -> u64 { self.bytes_with_voxel_size(std::mem::size_of::<T>()) }

    /// Bytes needed to hold the whole volume with voxels `voxel_bytes` wide
    pub fn bytes_with_voxel_size(&self, voxel_bytes: usize) -> u64 {
        self.n_voxels() * voxel_bytes as u64
    }

    /// Bytes in one `dim_x * dim_y` slice
    pub fn slice_bytes(&self, voxel_bytes: usize) -> u64 {
        self.dim_x as u64 * self.dim_y as u64 * voxel_bytes as u64
    }

    /// Physical size of the volume along each axis
    pub fn extent(&self) -> (Length, Length, Length) {
        (self.dim_x as f32 * self.l_vx_x,
         self.dim_y as f32 * self.l_vx_y,
         self.dim_z as f32 * self.l_vx_z)
    }

    /// Physical extent along the rotation axis
    pub fn height(&self) -> Length { self.extent().2 }

    /// Largest in-plane distance from the rotation axis covered by the volume
    pub fn max_radius(&self) -> Length { self.extent().0 / 2.0 }
}

/// Derive the volume which can be reconstructed from projections taken with
/// `det`.
///
/// The in-plane radius `r` is the largest one whose every point projects onto
/// the detector at all angles. Voxels are sized so that, at that radius, one
/// voxel projects onto one detector pixel. Voxels are cubes.
///
/// Degenerate input (such as zero distances) results in a geometry with zero
/// dimensions: no validation happens here.
pub fn derive_volume_geometry(det: &DetectorGeometry) -> VolumeGeometry {
    let vol = make_volume_geometry(det);

    let (x, y, z) = vol.extent();
    log::info!("Volume dimensions [vx]: {} x {} x {}", vol.dim_x, vol.dim_y, vol.dim_z);
    log::info!("Volume dimensions [mm]: {:.2} x {:.2} x {:.2}", mm_(x), mm_(y), mm_(z));
    log::info!("Voxel size [mm]: {:.4} x {:.4} x {:.4}", mm_(vol.l_vx_x), mm_(vol.l_vx_y), mm_(vol.l_vx_z));

    vol
}

fn make_volume_geometry(det: &DetectorGeometry) -> VolumeGeometry {
    let d_so = det.d_so.abs();
    let d_sd = det.d_sd();

    // ----- Slice: x and y ----------------------------------------------------
    // Half of the detector width, extended by the centre offset
    let half_width: Length = det.width() / 2.0 + det.offset_s();
    let alpha: Angle = (half_width / d_sd).atan();
    let r: Length = d_so * alpha.sin();

    let half_width_in_pixels: Ratio = half_width / det.l_px_row;
    let l_vx_x: Length = r / ratio_(half_width_in_pixels);
    let dim_x = to_voxels((2.0 * r) / l_vx_x);

    // ----- Number of slices: z -----------------------------------------------
    let l_vx_z = l_vx_x;
    let half_height: Length = det.height() / 2.0 + det.offset_t();
    let magnification: Ratio = d_so / d_sd;
    let dim_z = to_voxels(half_height * magnification * 2.0 / l_vx_z);

    VolumeGeometry {
        dim_x, dim_y: dim_x, dim_z,
        l_vx_x, l_vx_y: l_vx_x, l_vx_z,
    }
}

// Truncating, like the reconstruction kernel does. NaN (from degenerate
// input) becomes 0.
fn to_voxels(n: Ratio) -> u32 { ratio_(n) as u32 }


#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use units::mm;

    fn detector(n_row: u32, n_col: u32, px: f32, d_so: f32, d_od: f32) -> DetectorGeometry {
        DetectorGeometry {
            n_row, n_col,
            l_px_row: mm(px), l_px_col: mm(px),
            delta_s: 0.0, delta_t: 0.0,
            d_so: mm(d_so), d_od: mm(d_od),
        }
    }

    // Same calculation in f64, to check the uom version against
    fn expected(det: &DetectorGeometry) -> (f64, f64, f64) {
        let px = mm_(det.l_px_row) as f64;
        let half = det.n_row as f64 * px / 2.0 + mm_(det.offset_s()) as f64;
        let d_so = mm_(det.d_so).abs() as f64;
        let d_sd = mm_(det.d_sd()) as f64;
        let r = d_so * (half / d_sd).atan().sin();
        let l_vx = r / (half / px);
        let half_height = det.n_col as f64 * mm_(det.l_px_col) as f64 / 2.0 + mm_(det.offset_t()) as f64;
        let dim_z = half_height * (d_so / d_sd) * 2.0 / l_vx;
        (2.0 * r / l_vx, dim_z, l_vx)
    }

    #[rstest(/**/ n_row, n_col,  px ,  d_so ,  d_od ,
             case(1000,  800, 0.2 ,  500.0,  500.0),
             case(2048, 2048, 0.1 ,  250.0,  750.0),
             case( 512,  256, 0.4 , 1000.0,  100.0),
             case(  64,   64, 1.0 ,  -80.0,   40.0),
    )]
    fn dimensions_follow_from_detector(n_row: u32, n_col: u32, px: f32, d_so: f32, d_od: f32) {
        let det = detector(n_row, n_col, px, d_so, d_od);
        let vol = derive_volume_geometry(&det);
        let (dim_xy, dim_z, l_vx) = expected(&det);
        // Truncation of nearly-integral values may go either way in f32
        assert!((vol.dim_x as f64 - dim_xy).abs() <= 1.0, "{} vs {dim_xy}", vol.dim_x);
        assert!((vol.dim_z as f64 - dim_z ).abs() <= 1.0, "{} vs {dim_z}" , vol.dim_z);
        assert_eq!(vol.dim_x, vol.dim_y);
        assert_float_eq!(mm_(vol.l_vx_x) as f64, l_vx, r2nd <= 1e-5);
        assert_eq!(vol.l_vx_x, vol.l_vx_y);
        assert_eq!(vol.l_vx_x, vol.l_vx_z);
    }

    #[test]
    fn centre_offset_widens_the_volume() {
        let centred = detector(1000, 800, 0.2, 500.0, 500.0);
        let shifted = DetectorGeometry { delta_s: 20.0, delta_t: -10.0, ..centred };
        let a = derive_volume_geometry(&centred);
        let b = derive_volume_geometry(&shifted);
        assert!(b.dim_x > a.dim_x);
        assert!(b.dim_z > a.dim_z);
    }

    #[test]
    fn degenerate_detector_gives_empty_volume() {
        let vol = derive_volume_geometry(&detector(1000, 800, 0.2, 0.0, 0.0));
        assert_eq!((vol.dim_x, vol.dim_y, vol.dim_z), (0, 0, 0));
    }

    #[test]
    fn sizes_and_extents() {
        let vol = VolumeGeometry {
            dim_x: 10, dim_y: 20, dim_z: 30,
            l_vx_x: mm(0.5), l_vx_y: mm(0.5), l_vx_z: mm(2.0),
        };
        assert_eq!(vol.n_voxels(), 6000);
        assert_eq!(vol.bytes::<f32>(), 24_000);
        assert_eq!(vol.bytes::<u16>(), 12_000);
        assert_eq!(vol.bytes_with_voxel_size(8), 48_000);
        assert_eq!(vol.bytes_with_voxel_size(4), vol.bytes::<f32>());
        assert_eq!(vol.slice_bytes(4), 800);
        assert_float_eq!(mm_(vol.height()),     60.0, ulps <= 1);
        assert_float_eq!(mm_(vol.max_radius()),  2.5, ulps <= 1);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn derivation_is_deterministic(
            n_row   in 16..4096_u32,
            n_col   in 16..4096_u32,
            px      in 0.05..1.0_f32,
            d_so    in 50.0..2000.0_f32,
            d_od    in 10.0..2000.0_f32,
            delta_s in -50.0..50.0_f32,
            delta_t in -50.0..50.0_f32,
        ) {
            let det = DetectorGeometry { delta_s, delta_t, ..detector(n_row, n_col, px, d_so, d_od) };
            let a = derive_volume_geometry(&det);
            let b = derive_volume_geometry(&det);
            prop_assert_eq!(a.dim_x, b.dim_x);
            prop_assert_eq!(a.dim_z, b.dim_z);
            prop_assert_eq!(mm_(a.l_vx_x).to_bits(), mm_(b.l_vx_x).to_bits());
            prop_assert_eq!(mm_(a.l_vx_z).to_bits(), mm_(b.l_vx_z).to_bits());
        }
    }
}
