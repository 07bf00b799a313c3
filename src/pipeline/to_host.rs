//! Copying device-resident images back to the host, one worker thread per
//! device.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::device::{Accelerator, DeviceError};
use crate::image::{DeviceImage, HostImage};
use crate::partition::Partition;

use super::stage::panic_message;
use super::{OutputSide, PipelineError, Process};

type Copied = Result<HostImage, DeviceError>;

/// Transfer stage: device images in, host images out.
///
/// Each image is copied by the worker bound to the image's device. Copies of
/// images from the same device finish in the order they were submitted;
/// there is no ordering between devices.
///
/// A failed copy does not hold back the others: every successful copy is
/// still delivered, and the first failure is reported once the stream ends.
pub struct ToHostImage {
    workers: Vec<Worker>,
    results: Receiver<Copied>,
    failure: Option<PipelineError>,
}

struct Worker {
    device: usize,
    tasks: Sender<DeviceImage>,
    handle: JoinHandle<()>,
}

impl ToHostImage {

    /// Start one worker for every device in `partition`
    pub fn new<A>(partition: &Partition, accelerator: Arc<A>) -> Result<Self, PipelineError>
    where
        A: Accelerator + ?Sized + 'static,
    {
        let (results_tx, results) = unbounded();
        let workers = (0..partition.device_count())
            .map(|device| -> Result<Worker, PipelineError> {
                let (tasks, inbox) = unbounded();
                let accelerator = Arc::clone(&accelerator);
                let results = results_tx.clone();
                let name = format!("to-host-{device}");
                let handle = thread::Builder::new()
                    .name(name.clone())
                    .spawn(move || copy_loop(&*accelerator, device, inbox, results))
                    .map_err(|source| PipelineError::Spawn { name, source })?;
                Ok(Worker { device, tasks, handle })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;
        log::debug!("Started {} device-to-host workers", workers.len());
        Ok(Self { workers, results, failure: None })
    }

    /// Hand `image` to the worker of its device
    pub fn dispatch(&self, image: DeviceImage) -> Result<(), PipelineError> {
        let device = image.device;
        let worker = self.workers.get(device)
            .ok_or(PipelineError::UnknownDevice { device, count: self.workers.len() })?;
        worker.tasks.send(image).map_err(|_| PipelineError::WorkerStopped { device })
    }

    /// Outcomes of the copies finished so far, without blocking
    pub fn try_results(&self) -> Vec<Result<HostImage, DeviceError>> { self.results.try_iter().collect() }

    /// Signal end-of-stream to every worker, wait for all of them to finish,
    /// and return all copies not yet collected. If any copy failed, or any
    /// worker panicked, the first such error is returned instead.
    pub fn wait(mut self) -> Result<Vec<HostImage>, PipelineError> {
        let mut copied = vec![];
        self.complete(|image: HostImage| { copied.push(image); Ok(()) })?;
        Ok(copied)
    }

    /// Join all workers and pass every outstanding copy to `deliver`, even
    /// if some workers panicked.
    fn complete<F>(&mut self, mut deliver: F) -> Result<(), PipelineError>
    where
        F: FnMut(HostImage) -> Result<(), PipelineError>,
    {
        let drained = self.drain();
        // All senders are gone: nothing more can arrive
        let remaining = self.try_results();
        self.hand_over(remaining, &mut deliver)?;
        drained?;
        self.failure.take().map_or(Ok(()), Err)
    }

    /// Pass successful copies to `deliver`, keeping the first failure for
    /// later
    fn hand_over<F>(&mut self, copies: Vec<Copied>, deliver: &mut F) -> Result<(), PipelineError>
    where
        F: FnMut(HostImage) -> Result<(), PipelineError>,
    {
        for copied in copies {
            match copied {
                Ok(image) => deliver(image)?,
                Err(e) => {
                    log::error!("Device-to-host copy failed: {e}");
                    if self.failure.is_none() { self.failure = Some(e.into()) }
                }
            }
        }
        Ok(())
    }

    /// Close every work channel and join every worker. All workers are
    /// joined even if some of them panicked.
    fn drain(&mut self) -> Result<(), PipelineError> {
        let mut outcome = Ok(());
        for Worker { device, tasks, handle } in std::mem::take(&mut self.workers) {
            drop(tasks);
            if let Err(payload) = handle.join() {
                log::error!("Device-to-host worker #{device} panicked: {}", panic_message(&*payload));
                outcome = outcome.and(Err(PipelineError::Panicked(format!("to-host-{device}"))));
            }
        }
        outcome
    }
}

impl Drop for ToHostImage {
    fn drop(&mut self) {
        if self.workers.is_empty() { return }
        if let Err(e) = self.drain() {
            log::error!("While shutting down device-to-host workers: {e}");
        }
    }
}

fn copy_loop<A>(accelerator: &A, device: usize, inbox: Receiver<DeviceImage>, results: Sender<Copied>)
where
    A: Accelerator + ?Sized,
{
    if let Err(e) = accelerator.bind(device) {
        log::error!("Could not bind device #{device}: {e}");
        let _ = results.send(Err(e));
        return;
    }
    // Ends when the work channel is closed
    for image in inbox {
        if results.send(accelerator.copy_to_host(image)).is_err() { break }
    }
    log::debug!("Device-to-host worker #{device} done");
}

impl Process for ToHostImage {
    type Input = DeviceImage;
    type Output = HostImage;

    fn process(&mut self, image: DeviceImage, out: &OutputSide<HostImage>) -> Result<(), PipelineError> {
        self.dispatch(image)?;
        let ready = self.try_results();
        self.hand_over(ready, &mut |copied: HostImage| out.send(copied))
    }

    fn finish(&mut self, out: &OutputSide<HostImage>) -> Result<(), PipelineError> {
        self.complete(|copied: HostImage| out.send(copied))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HostAccelerator;
    use crate::pipeline::{feed, Sink, Stage};
    use geometry::{DetectorGeometry, VolumeGeometry};
    use pretty_assertions::assert_eq;
    use units::mm;

    fn partition(accelerator: &HostAccelerator) -> Partition {
        let detector = DetectorGeometry {
            n_row: 64, n_col: 64,
            l_px_row: mm(1.0), l_px_col: mm(1.0),
            delta_s: 0.0, delta_t: 0.0,
            d_so: mm(100.0), d_od: mm(100.0),
        };
        let volume = VolumeGeometry {
            dim_x: 16, dim_y: 16, dim_z: 16,
            l_vx_x: mm(1.0), l_vx_y: mm(1.0), l_vx_z: mm(1.0),
        };
        match Partition::new::<f32, _>(volume, &detector, accelerator) {
            Ok(p) => p,
            Err(e) => panic!("{e}"),
        }
    }

    fn image(device: usize, value: f32) -> DeviceImage { DeviceImage::new(2, 1, device, vec![value; 2]) }

    #[test]
    fn every_image_comes_back_from_its_device() -> Result<(), PipelineError> {
        let acc = Arc::new(HostAccelerator::new(vec![1 << 30; 3]));
        let stage = ToHostImage::new(&partition(&acc), acc.clone())?;
        for i in 0..30 { stage.dispatch(image(i % 3, i as f32))?; }

        let mut copied = stage.wait()?;
        assert_eq!(copied.len(), 30);
        copied.sort_by(|a, b| a.data[0].total_cmp(&b.data[0]));
        for (i, host) in copied.iter().enumerate() {
            assert_eq!(host.device, i % 3);
            assert_eq!(host.data, vec![i as f32; 2]);
        }
        Ok(())
    }

    #[test]
    fn per_device_order_is_preserved() -> Result<(), PipelineError> {
        let acc = Arc::new(HostAccelerator::new(vec![1 << 30; 2]));
        let stage = ToHostImage::new(&partition(&acc), acc.clone())?;
        for i in 0..50 { stage.dispatch(image(i % 2, i as f32))?; }
        let copied = stage.wait()?;
        for device in 0..2 {
            let values = copied.iter().filter(|c| c.device == device).map(|c| c.data[0]).collect::<Vec<_>>();
            let expected = (0..50).filter(|i| i % 2 == device).map(|i| i as f32).collect::<Vec<_>>();
            assert_eq!(values, expected);
        }
        Ok(())
    }

    #[test]
    fn unknown_device_is_rejected() -> Result<(), PipelineError> {
        let acc = Arc::new(HostAccelerator::new(vec![1 << 30; 2]));
        let stage = ToHostImage::new(&partition(&acc), acc.clone())?;
        let result = stage.dispatch(image(2, 0.0));
        assert!(matches!(result, Err(PipelineError::UnknownDevice { device: 2, count: 2 })));
        assert!(stage.wait()?.is_empty());
        Ok(())
    }

    #[test]
    fn as_a_pipeline_stage() -> Result<(), PipelineError> {
        let host = HostAccelerator::new(vec![1 << 30; 4]);
        let partition = partition(&host);
        let acc: Arc<dyn Accelerator> = Arc::new(host);
        let sink = Sink::new();
        let mut stage = Stage::new(ToHostImage::new(&partition, acc)?);
        stage.attach(sink.input());
        let entry = stage.input();
        let handle = stage.spawn("to-host")?;

        feed(&entry, (0..20).map(|i| image(i % 4, i as f32)))?;
        let copied = sink.collect()?;
        handle.join()?;
        assert_eq!(copied.len(), 20);
        Ok(())
    }

    /// Copies from `dead` always fail; other devices behave like the host
    struct OneDeadDevice { host: HostAccelerator, dead: usize }

    impl Accelerator for OneDeadDevice {
        fn device_count(&self) -> Result<usize, DeviceError> { self.host.device_count() }
        fn total_memory(&self, device: usize) -> Result<u64, DeviceError> { self.host.total_memory(device) }
        fn copy_to_host(&self, image: DeviceImage) -> Result<HostImage, DeviceError> {
            if image.device == self.dead {
                Err(DeviceError::Copy { device: self.dead, reason: "device lost".into() })
            } else {
                self.host.copy_to_host(image)
            }
        }
        fn copy_to_device(&self, image: HostImage, device: usize) -> Result<DeviceImage, DeviceError> {
            self.host.copy_to_device(image, device)
        }
    }

    #[test]
    fn failed_copies_do_not_hold_back_the_others() -> Result<(), PipelineError> {
        let host = HostAccelerator::new(vec![1 << 30; 2]);
        let partition = partition(&host);
        let acc: Arc<dyn Accelerator> = Arc::new(OneDeadDevice { host, dead: 1 });
        let sink = Sink::new();
        let mut stage = Stage::new(ToHostImage::new(&partition, acc)?);
        stage.attach(sink.input());
        let entry = stage.input();
        let handle = stage.spawn("to-host")?;

        feed(&entry, (0..10).map(|i| image(i % 2, i as f32)))?;
        let values = sink.collect()?.iter().map(|c| c.data[0]).collect::<Vec<_>>();
        assert_eq!(values, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
        assert!(matches!(handle.join(),
                         Err(PipelineError::Device(DeviceError::Copy { device: 1, .. }))));
        Ok(())
    }

    #[test]
    fn wait_reports_the_first_failed_copy() -> Result<(), PipelineError> {
        let host = HostAccelerator::new(vec![1 << 30; 2]);
        let partition = partition(&host);
        let stage = ToHostImage::new(&partition, Arc::new(OneDeadDevice { host, dead: 0 }))?;
        for i in 0..6 { stage.dispatch(image(i % 2, i as f32))?; }
        assert!(matches!(stage.wait(), Err(PipelineError::Device(DeviceError::Copy { device: 0, .. }))));
        Ok(())
    }
}
