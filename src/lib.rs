pub mod attributes;
pub mod cli;
pub mod error;
pub mod proxy_service;
pub mod route_config;
pub mod server;
pub mod std_logger;
