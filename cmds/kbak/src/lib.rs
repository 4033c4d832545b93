pub mod backup;
pub mod clean;
pub mod commands;
pub mod config;
pub mod k8s;
pub mod sanitize;
pub mod telemetry;
pub mod yaml;
