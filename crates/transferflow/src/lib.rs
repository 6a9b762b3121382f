pub mod config;
pub mod db;
pub mod engine;
pub mod jobs;
pub mod schedule;
pub mod transfer;

pub use engine::Engine;
