pub mod config;
pub mod export;
pub mod pipeline;
pub mod protocol;
pub mod scanner;
