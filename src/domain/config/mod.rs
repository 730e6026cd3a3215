//! Application configuration

mod app_config;

pub use app_config::{default_output_dir, AppConfig, DEFAULT_SAMPLE_RATE};
