use units::{Length, todo::Pixelf32};

/// Physical arrangement of X-ray source, rotation axis and flat-panel detector.
///
/// The detector has `n_row` pixels along each row (horizontal, perpendicular
/// to the rotation axis) and `n_col` pixels along each column (vertical,
/// parallel to the rotation axis), so `n_col` is also the number of detector
/// rows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorGeometry {
    /// Pixels per detector row
    pub n_row: u32,
    /// Pixels per detector column
    pub n_col: u32,

    /// Horizontal pixel size
    pub l_px_row: Length,
    /// Vertical pixel size
    pub l_px_col: Length,

    /// Horizontal offset of the detector centre, in pixels
    pub delta_s: Pixelf32,
    /// Vertical offset of the detector centre, in pixels
    pub delta_t: Pixelf32,

    /// Source to object (rotation axis) distance
    pub d_so: Length,
    /// Object (rotation axis) to detector distance
    pub d_od: Length,
}

impl DetectorGeometry {

    /// Source to detector distance. Distances may be given signed (source on
    /// the negative side of the axis); only their magnitudes matter.
    pub fn d_sd(&self) -> Length { self.d_so.abs() + self.d_od.abs() }

    /// Horizontal centre offset as a (non-negative) length
    pub fn offset_s(&self) -> Length { (self.delta_s * self.l_px_row).abs() }

    /// Vertical centre offset as a (non-negative) length
    pub fn offset_t(&self) -> Length { (self.delta_t * self.l_px_col).abs() }

    /// Physical height of the detector
    pub fn height(&self) -> Length { self.n_col as f32 * self.l_px_col }

    /// Physical width of the detector
    pub fn width(&self) -> Length { self.n_row as f32 * self.l_px_row }
}
