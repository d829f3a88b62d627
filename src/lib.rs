pub mod api;
pub mod chain;
pub mod config;
pub mod storage;
pub mod sync;
