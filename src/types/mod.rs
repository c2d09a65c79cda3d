pub mod constants;
pub mod error;
pub mod message;

pub use constants::*;
pub use error::{PhoenixError, Result};
pub use message::PhoenixMessage;
