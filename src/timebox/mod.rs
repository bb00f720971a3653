//! Time intervals and time-boxed assignments.
//!
//! - `interval` - the intersection rule, spans and free slot search
//! - `timebox` - `TimeBox<T>`, an item assigned for a span

pub mod interval;
#[allow(clippy::module_inception)]
pub mod timebox;

pub use interval::*;
pub use timebox::*;
