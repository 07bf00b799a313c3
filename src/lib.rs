mod exports;
pub use exports::*;

pub mod config;
pub mod device;
pub mod image;
pub mod partition;
pub mod pipeline;
pub mod utils;
