//! # ree-session
//!
//! Client-side sessions with services running in the REE (the normal,
//! untrusted world), brokered through the generic proxy and the supplicant.
//!
//! A [`ReeSession`] is established in one all-or-nothing step: connect to
//! the generic proxy, resolve the service by UUID to an opaque
//! [`ServiceHandle`], and ask the service to start. Every later command
//! carries that handle in parameter slot 0, whatever the caller put there.
//! Closing the session stops the service, releases the handle and closes
//! the proxy connection, in that order.
//!
//! The secure OS primitive underneath (open/invoke/close on another task)
//! is abstracted by [`TaConnector`] and [`TaSession`]. The [`loopback`]
//! module provides an in-process implementation.
//!
//! ## Quick Start
//!
//! ```
//! use ree_session::loopback::{EchoService, LoopbackProxy};
//! use ree_session::{Param, ParamType, ParamTypes, Params, ReeSession, TeeUuid, Timeout};
//!
//! fn main() -> ree_session::Result<()> {
//!     ree_session::logging::try_init().ok();
//!
//!     let service: TeeUuid = "8aaaf200-2450-11e4-abe2-0002a5d5c51b".parse()?;
//!     let proxy = LoopbackProxy::new();
//!     proxy.register(service, || EchoService);
//!
//!     let mut session = ReeSession::open(&proxy, &service, Timeout::INFINITE, ParamTypes::NONE, None)?;
//!
//!     let types = ParamTypes::new(
//!         ParamType::None,
//!         ParamType::ValueInput,
//!         ParamType::ValueOutput,
//!         ParamType::None,
//!     );
//!     let mut params = Params::new().with(1, Param::value(5, 0));
//!     session.invoke(Timeout::INFINITE, 7, types, Some(&mut params))?;
//!     assert_eq!(params.value(2), Some((5, 0)));
//!
//!     session.close();
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod loopback;
pub mod param;
pub mod protocol;
pub mod proxy;
pub mod session;
pub mod uuid;

// Re-export commonly used types
pub use error::{InvokeFailure, ReeSessionError, Result, ReturnOrigin, TeeErrorCode};
pub use param::{Param, ParamType, ParamTypes, Params, NUM_PARAMS};
pub use protocol::Timeout;
pub use proxy::{TaConnector, TaSession};
pub use session::{ReeSession, ServiceHandle};
pub use uuid::TeeUuid;
