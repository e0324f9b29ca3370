//! Core data types shared across services and the API layer.

mod price;
mod trading;
mod user;

pub use price::*;
pub use trading::*;
pub use user::*;
