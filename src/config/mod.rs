//! Configuration file parser for partitioning runs
//!
//! ```toml
//! voxel_bytes = 4
//!
//! [detector]
//! n_row    = 1000
//! n_col    = 800
//! l_px_row = "0.2 mm"
//! l_px_col = "0.2 mm"
//! delta_s  = 0.0
//! delta_t  = 0.0
//! d_so     = "500 mm"
//! d_od     = "500 mm"
//!
//! [roi]
//! x = [0, 499]
//! y = [0, 499]
//! z = [100, 300]
//!
//! [devices]
//! memory = ["16 GiB", "600 MB"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, de};

use geometry::{DetectorGeometry, RegionOfInterest};
use units::{gib, n_bytes, todo::Pixelf32, Information, Length};

fn deserialize_uom<'d, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'d>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    String::deserialize(deserializer)?
        .parse::<T>()
        .map_err(de::Error::custom)
}

fn deserialize_uom_vec<'d, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'d>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    Vec::<String>::deserialize(deserializer)?
        .iter()
        .map(|s| s.parse::<T>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(de::Error::custom)
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {

    pub detector: Detector,

    /// Part of the derived volume to reconstruct; all of it, if absent
    #[serde(default)]
    pub roi: Option<Roi>,

    #[serde(default)]
    pub devices: Devices,

    /// Size of one voxel of the reconstructed volume
    #[serde(default = "default_voxel_bytes")]
    pub voxel_bytes: usize,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct Detector {
    pub n_row: u32,
    pub n_col: u32,

    #[serde(deserialize_with = "deserialize_uom")]
    pub l_px_row: Length,
    #[serde(deserialize_with = "deserialize_uom")]
    pub l_px_col: Length,

    #[serde(default)]
    pub delta_s: Pixelf32,
    #[serde(default)]
    pub delta_t: Pixelf32,

    #[serde(deserialize_with = "deserialize_uom")]
    pub d_so: Length,
    #[serde(deserialize_with = "deserialize_uom")]
    pub d_od: Length,
}

impl From<&Detector> for DetectorGeometry {
    fn from(d: &Detector) -> Self {
        DetectorGeometry {
            n_row: d.n_row, n_col: d.n_col,
            l_px_row: d.l_px_row, l_px_col: d.l_px_col,
            delta_s: d.delta_s, delta_t: d.delta_t,
            d_so: d.d_so, d_od: d.d_od,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Roi {
    pub x: (u32, u32),
    pub y: (u32, u32),
    pub z: (u32, u32),
}

impl From<Roi> for RegionOfInterest {
    fn from(Roi { x, y, z }: Roi) -> Self { RegionOfInterest::new(x, y, z) }
}

/// The simulated accelerators to partition over
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct Devices {
    /// One entry per device
    #[serde(deserialize_with = "deserialize_uom_vec")]
    pub memory: Vec<Information>,
}

impl Default for Devices {
    fn default() -> Self { Self { memory: vec![gib(16.0)] } }
}

impl Devices {
    /// Device memories in bytes
    pub fn memories(&self) -> Vec<u64> { self.memory.iter().copied().map(n_bytes).collect() }
}

fn default_voxel_bytes() -> usize { std::mem::size_of::<f32>() }

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("couldn't read config file `{path}`")]
    Read { path: PathBuf, #[source] source: std::io::Error },

    #[error("couldn't parse config file `{path}`: {source}")]
    Parse { path: PathBuf, #[source] source: toml::de::Error },
}

impl FromStr for Config {
    type Err = toml::de::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> { toml::from_str(s) }
}

pub fn read_config_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.into(), source })?;
    text.parse()
        .map_err(|source| ConfigError::Parse { path: path.into(), source })
}
