//! Interface to the inter-task session primitive.
//!
//! The secure OS provides open/invoke/close on another trusted task. This
//! crate only needs that narrow surface, so it is expressed as a pair of
//! traits that a host (or the [`loopback`](crate::loopback) proxy) implements.

use crate::error::{InvokeFailure, TeeErrorCode};
use crate::param::{ParamTypes, Params};
use crate::protocol::Timeout;
use crate::uuid::TeeUuid;

/// Opens sessions on trusted tasks identified by UUID.
pub trait TaConnector {
    type Session: TaSession;

    /// Open a session with no parameters.
    fn open_session(
        &self,
        destination: &TeeUuid,
        timeout: Timeout,
    ) -> Result<Self::Session, TeeErrorCode>;
}

/// An open session on a trusted task.
pub trait TaSession {
    /// Invoke `command_id`, letting the callee update `params` in place.
    fn invoke_command(
        &mut self,
        timeout: Timeout,
        command_id: u32,
        param_types: ParamTypes,
        params: &mut Params,
    ) -> Result<(), InvokeFailure>;

    /// Close the session. Cannot fail.
    fn close(self);
}
