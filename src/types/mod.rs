//! Core identity types for the preview engine.

mod ids;

pub use ids::{CorrelationId, HostId, InvalidCorrelationId, InvalidHostId};
