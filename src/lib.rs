pub mod app_state;
pub mod client;
pub mod config;
pub mod error;
pub mod extractor;
pub mod grammar;
pub mod io_struct;
pub mod logging;
pub mod middleware;
pub mod rate_limit;
pub mod render;
pub mod server;
pub mod stream;
pub mod upstream;
