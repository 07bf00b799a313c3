mod cli;

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let mut progress = Progress::new();

    progress.start("Reading config file");
    let config = read_config_file(&args.config)?;
    progress.done();

    // --- Geometry ------------------------------------------------------------------
    let detector = DetectorGeometry::from(&config.detector);
    let volume = derive_volume_geometry(&detector);
    let volume = match args.roi.or(config.roi.map(RegionOfInterest::from)) {
        Some(roi) => apply_region_of_interest(&volume, &roi),
        None      => volume,
    };

    // --- Devices and partition -----------------------------------------------------
    let memories = if args.memory.is_empty() { config.devices.memories() } else { args.memory.clone() };
    let accelerator = Arc::new(HostAccelerator::new(memories));
    let voxel_bytes = args.voxel_bytes.unwrap_or(config.voxel_bytes);

    progress.start("Partitioning volume");
    let partition = Arc::new(Partition::with_voxel_bytes(volume, &detector, voxel_bytes, &*accelerator)?);
    progress.done();
    report(&partition);

    // --- Optional streaming demonstration ------------------------------------------
    if args.demo_images > 0 {
        progress.start("Copying sub-projections to host");
        println!();
        let bytes = stream_demo_images(&partition, accelerator, detector.n_row, args.demo_images)?;
        progress.done_with_message(&format!("Copied {} bytes", group_digits(bytes)));
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn report(partition: &Partition) {
    let vol = partition.volume_geometry();
    println!("Volume: {} x {} x {} voxels, {} bytes",
             vol.dim_x, vol.dim_y, vol.dim_z, group_digits(vol.bytes_with_voxel_size(partition.voxel_bytes())));
    for device in 0..partition.device_count() {
        let n = partition.chunk_count(device);
        println!("Device #{device}: {} bytes of memory, {n} chunk{}",
                 group_digits(partition.device_memory(device)), if n == 1 { "" } else { "s" });
        for chunk in partition.chunks(device) {
            println!("    chunk {:>3}: slices {:>5} ..{:>5}  {:>15} bytes  rows {:>5} ..={:>5}",
                     chunk.index, chunk.slices().start, chunk.slices().end,
                     group_digits(chunk.bytes), chunk.rows.0, chunk.rows.1);
        }
    }
}

/// Push `per_chunk` empty sub-projections for every chunk through a
/// `ToHostImage` stage, returning the number of bytes that arrived on the host
fn stream_demo_images(
    partition  : &Arc<Partition>,
    accelerator: Arc<HostAccelerator>,
    width      : u32,
    per_chunk  : usize,
) -> Result<u64, Box<dyn Error>> {
    let total = partition.total_chunks() as u64 * per_chunk as u64;
    let bar = ProgressBar::new(total);
    bar.set_style(ProgressStyle::default_bar()
                  .template("[{elapsed_precise}] {wide_bar} {pos}/{len} ({eta_precise})")?);

    let arrived = Queue::unbounded();
    let mut to_host = Stage::with_capacity(ToHostImage::new(partition, accelerator)?, 64);
    to_host.attach(arrived.port());
    let entry = to_host.input();
    let stage = to_host.spawn("to-host")?;

    let feeder = {
        let partition = Arc::clone(partition);
        thread::Builder::new().name("feeder".into()).spawn(move || {
            let images = partition.all_chunks().flat_map(|chunk| {
                (0..per_chunk).map(move |_| DeviceImage::zeros(width, chunk.rows_len(), chunk.device))
            });
            feed(&entry, images)
        })?
    };

    let mut bytes = 0;
    while let Item::Data(image) = arrived.pop()? {
        bytes += (image.len() * std::mem::size_of::<Intensityf32>()) as u64;
        bar.inc(1);
    }
    bar.finish();

    // The stage's own failure explains any failure of the feeder
    stage.join()?;
    feeder.join().map_err(|_| PipelineError::Panicked("feeder".into()))??;
    Ok(bytes)
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::{error::Error, sync::Arc, thread};
use clap::Parser;
use cli::Cli;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use units::todo::Intensityf32;
use conebeam::{
    apply_region_of_interest, derive_volume_geometry,
    config::read_config_file,
    DetectorGeometry, DeviceImage, HostAccelerator, Item, Partition, PipelineError, RegionOfInterest,
    pipeline::{feed, Queue, Stage, ToHostImage},
    utils::{group_digits, timing::Progress},
};
