//! REST intake and status surface

pub mod handlers;
pub mod router;
pub mod state;
