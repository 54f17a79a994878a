//! Raw data producers feeding the pipeline

pub mod sample;

pub use sample::{collect_sample, raw_file_path, sample_announcements, ALL_SOURCES};
