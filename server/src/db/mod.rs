//! Collection storage. Kept in memory; the server is a reference backend.

mod collections;

pub use collections::*;
