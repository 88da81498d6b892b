pub mod api;
pub mod config;
pub mod distance;
pub mod ids;
pub mod isp;
pub mod models;
pub mod redaction;
pub mod render;
pub mod storage;
pub mod telemetry;
