pub mod chains;
pub mod cli;
pub mod config;
pub mod core;
pub mod signatures;
pub mod utils;
