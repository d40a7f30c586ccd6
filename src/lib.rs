pub mod config;
pub mod error;
pub mod geometry;
pub mod input;
pub mod model;
pub mod network;
pub mod output;
pub mod pipeline;
pub mod scoring;
pub mod significance;
pub mod stats;
