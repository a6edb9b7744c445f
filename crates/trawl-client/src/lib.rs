pub mod analyzer;
pub mod config;
mod http;
pub mod worker;

pub use analyzer::HttpAnalyzer;
pub use config::EndpointConfig;
pub use worker::HttpScrapeWorker;
