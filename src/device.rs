//! The boundary to accelerator hardware: enumeration, memory capacity, and
//! copies between host and device memory.

use crate::image::{DeviceImage, HostImage};

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("could not enumerate accelerator devices: {0}")]
    Enumeration(String),

    #[error("could not query memory of device #{device}: {reason}")]
    MemoryQuery { device: usize, reason: String },

    #[error("device #{device} does not exist ({count} devices available)")]
    UnknownDevice { device: usize, count: usize },

    #[error("copy involving device #{device} failed: {reason}")]
    Copy { device: usize, reason: String },
}

/// Everything the scheduler and the pipeline need from an accelerator API.
///
/// Enumeration and memory queries are made once, when the partition is
/// computed; their answers are taken to hold for the whole run.
pub trait Accelerator: Send + Sync {

    /// Number of usable devices
    fn device_count(&self) -> Result<usize, DeviceError>;

    /// Total memory of `device`, in bytes
    fn total_memory(&self, device: usize) -> Result<u64, DeviceError>;

    /// Make `device` current for the calling thread. Device-affine threads
    /// call this once, before their first copy.
    fn bind(&self, _device: usize) -> Result<(), DeviceError> { Ok(()) }

    /// Synchronous device-to-host copy; blocks the calling thread until done
    fn copy_to_host(&self, image: DeviceImage) -> Result<HostImage, DeviceError>;

    /// Synchronous host-to-device copy
    fn copy_to_device(&self, image: HostImage, device: usize) -> Result<DeviceImage, DeviceError>;
}

/// Accelerators simulated in host memory.
///
/// Each device is described only by its memory capacity; device-resident
/// images are ordinary vectors tagged with their device index.
#[derive(Clone, Debug)]
pub struct HostAccelerator {
    memories: Vec<u64>,
}

impl HostAccelerator {
    pub fn new(memories: Vec<u64>) -> Self { Self { memories } }

    fn check(&self, device: usize) -> Result<(), DeviceError> {
        let count = self.memories.len();
        if device < count { Ok(()) }
        else              { Err(DeviceError::UnknownDevice { device, count }) }
    }
}

impl Accelerator for HostAccelerator {

    fn device_count(&self) -> Result<usize, DeviceError> { Ok(self.memories.len()) }

    fn total_memory(&self, device: usize) -> Result<u64, DeviceError> {
        self.check(device)?;
        Ok(self.memories[device])
    }

    fn bind(&self, device: usize) -> Result<(), DeviceError> { self.check(device) }

    fn copy_to_host(&self, image: DeviceImage) -> Result<HostImage, DeviceError> {
        self.check(image.device)?;
        let device = image.device;
        Ok(image.relocate(device))
    }

    fn copy_to_device(&self, image: HostImage, device: usize) -> Result<DeviceImage, DeviceError> {
        self.check(device)?;
        Ok(image.relocate(device))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn host_accelerator_reports_its_devices() -> Result<(), DeviceError> {
        let acc = HostAccelerator::new(vec![1 << 30, 600_000_000]);
        assert_eq!(acc.device_count()?, 2);
        assert_eq!(acc.total_memory(0)?, 1 << 30);
        assert_eq!(acc.total_memory(1)?, 600_000_000);
        assert!(matches!(acc.total_memory(2), Err(DeviceError::UnknownDevice { device: 2, count: 2 })));
        Ok(())
    }

    #[test]
    fn copies_preserve_dimensions_and_data() -> Result<(), DeviceError> {
        let acc = HostAccelerator::new(vec![1 << 20; 2]);
        let host = HostImage::new(2, 2, 0, vec![1.0, 2.0, 3.0, 4.0]);
        let on_device = acc.copy_to_device(host.clone(), 1)?;
        assert_eq!(on_device.device, 1);
        let back = acc.copy_to_host(on_device)?;
        assert_eq!(back.data, host.data);
        assert_eq!((back.width, back.height, back.device), (2, 2, 1));
        Ok(())
    }

    #[test]
    fn copy_to_missing_device_fails() {
        let acc = HostAccelerator::new(vec![1 << 20]);
        let result = acc.copy_to_device(HostImage::zeros(1, 1, 0), 3);
        assert!(matches!(result, Err(DeviceError::UnknownDevice { device: 3, count: 1 })));
    }
}
