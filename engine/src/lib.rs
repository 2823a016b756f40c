use crate::image_model::ImageGenerator;

pub mod config;
pub mod download;
pub mod filename;
pub mod image_model;
pub mod metadata;
pub mod progress;
pub mod prompt;
pub mod session;

#[cfg(test)]
mod test_util;

pub type ImgGenBox = Box<dyn ImageGenerator + Send + Sync>;
pub const DEFAULT_LOG_FILE: &str = "image_generation.log";
