//! Utility helpers: math extensions, the generational allocator, and logging.

pub mod allocator;
pub mod logging;
pub mod math;

pub use allocator::{Arena, EntityId};
pub use logging::ScopedTimer;
pub use math::*;
