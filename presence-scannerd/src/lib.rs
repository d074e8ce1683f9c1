pub mod api;
pub mod config;
pub mod mdns;
pub mod scanner;
