pub mod config;
pub mod import;
pub mod loader;
pub mod output;
pub mod store;
