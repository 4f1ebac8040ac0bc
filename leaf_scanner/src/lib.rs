mod page;
mod routes;
mod server;

pub mod app;
pub mod config;
pub mod treatment;

pub use app::start_app;
