pub mod auth;
pub mod board;
pub mod team;

pub use auth::*;
pub use board::*;
pub use team::*;
