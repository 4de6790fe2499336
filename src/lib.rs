pub mod error;
pub use error::*;

pub mod client;
pub mod config;
pub mod dns;
pub mod pullzone;
pub mod record;
pub mod rules;
pub mod sync;
