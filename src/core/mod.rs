pub mod aggregate;
pub mod client;
pub mod partition;
pub mod report;
pub mod resolver;
pub mod scanner;
pub mod types;
