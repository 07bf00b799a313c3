//! Two-dimensional images (projections, or slices of a sub-volume) and where
//! their data lives.

use std::marker::PhantomData;

use units::todo::Intensityf32;

pub type ImageData = Vec<Intensityf32>;
#[allow(non_camel_case_types)]
pub type Index2_u = [usize; 2];

/// Data resident in accelerator memory
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnDevice {}

/// Data resident in host memory
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnHost {}

/// A `width` x `height` image of intensities, stored row by row.
///
/// `device` records which accelerator the data belongs to (or came from, for
/// host-resident images); it is what the pipeline routes on.
#[derive(Clone, Debug, PartialEq)]
pub struct Image<L> {
    pub width: u32,
    pub height: u32,
    pub device: usize,
    pub data: ImageData,
    location: PhantomData<L>,
}

pub type DeviceImage = Image<OnDevice>;
pub type HostImage = Image<OnHost>;

impl<L> Image<L> {

    /// # Panics
    /// If `data` does not hold exactly `width * height` values.
    pub fn new(width: u32, height: u32, device: usize, data: ImageData) -> Self {
        if data.len() != width as usize * height as usize {
            panic!("Image data ({} values) does not match dimensions {width} x {height}", data.len());
        }
        Self { width, height, device, data, location: PhantomData }
    }

    pub fn zeros(width: u32, height: u32, device: usize) -> Self {
        Self::new(width, height, device, vec![0.0; width as usize * height as usize])
    }

    pub fn len(&self) -> usize { self.data.len() }
    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    /// Same dimensions and data, living somewhere else. Only accelerator
    /// bindings should need this.
    pub fn relocate<M>(self, device: usize) -> Image<M> {
        let Self { width, height, data, .. } = self;
        Image { width, height, device, data, location: PhantomData }
    }
}

impl<L> core::ops::Index<Index2_u> for Image<L> {
    type Output = Intensityf32;
    fn index(&self, i2: Index2_u) -> &Self::Output {
        &self.data[index2_to_1(i2, self.width as usize)]
    }
}

impl<L> core::ops::IndexMut<Index2_u> for Image<L> {
    fn index_mut(&mut self, i2: Index2_u) -> &mut Self::Output {
        let i1 = index2_to_1(i2, self.width as usize);
        &mut self.data[i1]
    }
}

#[inline]
pub fn index2_to_1([ix, iy]: Index2_u, nx: usize) -> usize { ix + iy * nx }


#[cfg(test)]
mod test_image {
    use super::*;
    use rstest::rstest;

    #[rstest(/**/ width, index , index1,
             case(  1 , [0, 0],    0  ),
             case(  1 , [0, 7],    7  ),
             case(  9 , [3, 0],    3  ),
             case( 10 , [7, 9],   97  ),
             case(  4 , [3, 2],   11  ),
    )]
    fn row_major_indexing(width: usize, index: Index2_u, index1: usize) {
        assert_eq!(index2_to_1(index, width), index1);
    }

    #[test]
    fn index_and_relocate() {
        let mut image = DeviceImage::zeros(3, 2, 1);
        image[[2, 1]] = 5.0;
        assert_eq!(image.data, vec![0.0, 0.0, 0.0, 0.0, 0.0, 5.0]);

        let host: HostImage = image.relocate(1);
        assert_eq!((host.width, host.height, host.device), (3, 2, 1));
        assert_eq!(host[[2, 1]], 5.0);
    }

    #[test]
    #[should_panic]
    fn mismatched_data_is_rejected() {
        HostImage::new(3, 3, 0, vec![1.0; 8]);
    }
}
