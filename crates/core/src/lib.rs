pub mod event;
pub mod frame;
pub mod workflow;

pub use event::*;
pub use frame::*;
pub use workflow::*;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
