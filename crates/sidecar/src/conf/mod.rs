//! Configuration domain — model, loading, validation.

pub mod load;
pub mod model;

pub use model::{RuntimeKind, SidecarConfig};
