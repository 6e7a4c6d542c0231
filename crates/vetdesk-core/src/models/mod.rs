//! Domain models for the vetdesk system.

mod appointment;
mod branch;
mod drug;
mod patient;
mod principal;
mod record;

pub use appointment::*;
pub use branch::*;
pub use drug::*;
pub use patient::*;
pub use principal::*;
pub use record::*;
