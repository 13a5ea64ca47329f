//! API request handlers

mod health;
mod networking;
mod requests;

pub use health::*;
pub use networking::*;
pub use requests::*;
