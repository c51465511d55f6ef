//! REE session management.
//!
//! A session is obtained in one all-or-nothing step, carries its service
//! handle into every command through parameter slot 0, and is retired by an
//! ordered stop-then-close teardown.

mod handle;
mod inject;
mod ree;

pub use handle::ServiceHandle;
pub use ree::ReeSession;
