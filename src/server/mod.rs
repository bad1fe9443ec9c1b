mod api_error;
mod catalog_routes;
mod directory_routes;
mod genealogy_routes;
mod http_layers;
pub mod server;
pub mod session;
pub mod state;

pub use crate::config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server};
