//! Clap argument groups and process setup shared by the srct binaries.

pub mod common;

pub use common::{init_logging, init_worker_pool, DatasetArgs};
