pub mod config;
pub mod errors;
pub mod export;
pub mod ingest;
pub mod sentiment;
pub mod storage;
