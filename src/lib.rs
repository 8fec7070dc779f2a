pub mod api;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod frontends;
pub mod logging;
pub mod managers;
pub mod models;
pub mod session;
pub mod store;

pub use error::{Error, Result};
