//! Core crate for RIFE frame-pair interpolation.

pub mod backend;
pub mod config;
pub mod error;
pub mod image_io;
pub mod interpolator;
pub mod logging;
pub mod model_loader;
pub mod pipeline;
pub mod runtime;
pub mod sequence;
pub mod types;
