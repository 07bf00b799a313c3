/// Command line interface for `conebeam` executable
#[derive(clap::Parser, Debug, Clone)]
#[clap(
    name = "conebeam",
    about = "Partition a cone-beam reconstruction volume over accelerator devices",
)]
pub (super) struct Cli {
    /// TOML file describing detector, region of interest and devices
    pub config: PathBuf,

    /// Region of interest in voxels: x1,x2,y1,y2,z1,z2 [overrides config file]
    #[clap(long, value_parser = parse_roi)]
    pub roi: Option<RegionOfInterest>,

    /// Device memory sizes, one per device, e.g. "16 GiB,600 MB" [overrides config file]
    #[clap(short, long, value_delimiter = ',', value_parser = parse_memory)]
    pub memory: Vec<u64>,

    /// Bytes per voxel [overrides config file]
    #[clap(long)]
    pub voxel_bytes: Option<usize>,

    /// Stream this many synthetic sub-projections per chunk through the device-to-host stage
    #[clap(short, long, default_value = "0")]
    pub demo_images: usize,

    /// Log debug messages (RUST_LOG takes precedence)
    #[clap(short, long)]
    pub verbose: bool,
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::path::PathBuf;
use conebeam::RegionOfInterest;
use conebeam::utils::{parse_memory, parse_roi};
