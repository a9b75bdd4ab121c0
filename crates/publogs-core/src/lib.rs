pub mod config;
pub mod logging;

pub mod bucket;
pub mod fetch;
pub mod limiter;
pub mod orchestrator;
pub mod provider;
pub mod resolver;
pub mod retry;
pub mod storage;
pub mod task;
