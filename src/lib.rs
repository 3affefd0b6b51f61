pub mod acl;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod literals;
pub mod models;
pub mod parsing;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
pub mod tags;
pub mod utils;
pub mod workers;

pub use workers::{default_handlers, Worker};
