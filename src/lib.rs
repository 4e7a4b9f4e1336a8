pub mod config;
pub mod error;
pub mod observability;
pub mod session;
pub mod stream;
pub mod tools;
pub mod transport;

mod util;
