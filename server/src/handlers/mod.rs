//! Request handlers for collection routes.

mod batch;
mod list;

pub use batch::*;
pub use list::*;
