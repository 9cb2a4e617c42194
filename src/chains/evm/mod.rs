pub mod client;
pub mod context;
pub mod extract;
pub mod scanner;
pub mod worker;
