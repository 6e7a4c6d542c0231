//! Read-only views: scoped listings, aggregation and the owner dashboard.
//!
//! Nothing here writes; every view is computed from current data.

mod listing;
mod owner;
mod summary;

pub use listing::*;
pub use owner::*;
pub use summary::*;
