//! Core pipeline for extracting a structured dot/path description from a
//! raster image of a kolam pattern and rebuilding a symmetry-enforced
//! vector version of it.

pub mod anchor_detector;
pub mod config;
pub mod geometry;
pub mod metrics;
pub mod path_detector;
pub mod pipeline;
pub mod preprocess;
pub mod renderer;
pub mod symmetry;

pub use config::PipelineConfig;
pub use geometry::{CurvePath, LinePath, PathElement, Pattern, Point, CANVAS_SIZE};
pub use metrics::Metrics;
pub use pipeline::{DetectionResponse, KolamRequest, RecreationResponse};
