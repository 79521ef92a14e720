pub mod buckets;
pub mod config;
pub mod data;
pub mod filter;
pub mod logging;
pub mod report;
pub mod session;
