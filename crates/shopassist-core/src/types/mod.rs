//! Shared domain types.

mod conversation;
mod product;
mod store;

pub use conversation::*;
pub use product::*;
pub use store::*;
