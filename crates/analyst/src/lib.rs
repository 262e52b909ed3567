pub mod agent;
pub mod aggregator;
pub mod config;
pub mod errors;
pub mod execution;
pub mod generation;
pub mod http_tool;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod registry;
pub mod sink;
