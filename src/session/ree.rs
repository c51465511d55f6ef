//! REE session establishment, command invocation and teardown.

use std::fmt;

use tracing::{debug, error, info, warn};

use super::inject::inject_handle;
use super::ServiceHandle;
use crate::error::{InvokeFailure, ReeSessionError, ReturnOrigin, TeeErrorCode};
use crate::param::{Param, ParamType, ParamTypes, Params};
use crate::protocol::{
    command_name, Timeout, GENERIC_CLOSE, GENERIC_OPEN, GENERIC_PROXY_UUID,
    GENERIC_SERVICE_START, GENERIC_SERVICE_STOP,
};
use crate::proxy::{TaConnector, TaSession};
use crate::uuid::TeeUuid;
use crate::Result;

/// Descriptor of the resolve command: identifier in, handle out.
const RESOLVE_PARAM_TYPES: ParamTypes = ParamTypes::new(
    ParamType::MemrefInput,
    ParamType::ValueOutput,
    ParamType::None,
    ParamType::None,
);

/// A logical session with one REE service, brokered by the generic proxy.
///
/// The session exclusively owns its proxy connection. [`close`](Self::close)
/// consumes it; dropping an open session runs the same teardown.
pub struct ReeSession<S: TaSession> {
    handle: ServiceHandle,
    connection: Option<S>,
}

impl<S: TaSession> ReeSession<S> {
    /// Resolve the service named by `destination` and ask it to start.
    ///
    /// Either every step succeeds and an established session is returned,
    /// or the proxy connection opened here is closed again before the error
    /// is returned. When `params` is given its slot 0 is overwritten with
    /// the service handle; slots 1..=3 reach the service as declared in
    /// `param_types`.
    pub fn open<C>(
        connector: &C,
        destination: &TeeUuid,
        timeout: Timeout,
        param_types: ParamTypes,
        params: Option<&mut Params>,
    ) -> Result<Self>
    where
        C: TaConnector<Session = S>,
    {
        let mut connection = connector
            .open_session(&GENERIC_PROXY_UUID, Timeout::ZERO)
            .map_err(|code| {
                error!("Failed to open session on generic proxy: {}", code);
                if code == TeeErrorCode::OUT_OF_MEMORY {
                    ReeSessionError::OutOfMemory
                } else {
                    ReeSessionError::ProxyConnect { code }
                }
            })?;

        let handle = match resolve(&mut connection, destination) {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to find REE service {}: {}", destination, e);
                connection.close();
                return Err(e);
            }
        };

        let mut internal = Params::new();
        let start_params = params.unwrap_or(&mut internal);
        let start_types = inject_handle(handle, param_types, start_params);
        if let Err(failure) =
            connection.invoke_command(timeout, GENERIC_SERVICE_START, start_types, start_params)
        {
            debug!(
                "Failed to initialize REE service {}: {} (origin {})",
                destination, failure.code, failure.origin
            );
            connection.close();
            return Err(ReeSessionError::command(GENERIC_SERVICE_START, failure));
        }

        info!("Opened REE session {} for service {}", handle, destination);
        Ok(Self {
            handle,
            connection: Some(connection),
        })
    }

    /// The handle issued by the proxy for this session.
    pub fn handle(&self) -> ServiceHandle {
        self.handle
    }

    /// Forward `command_id` to the service with the handle in slot 0.
    ///
    /// The command id is not interpreted here and the proxy's outcome is
    /// returned as is. Output slots in `params` are updated in place.
    pub fn invoke(
        &mut self,
        timeout: Timeout,
        command_id: u32,
        param_types: ParamTypes,
        params: Option<&mut Params>,
    ) -> Result<()> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(ReeSessionError::SessionClosed)?;

        let mut internal = Params::new();
        let params = params.unwrap_or(&mut internal);
        let param_types = inject_handle(self.handle, param_types, params);

        debug!(
            "Invoking {} ({:#x}) on REE session {}",
            command_name(command_id),
            command_id,
            self.handle
        );
        connection
            .invoke_command(timeout, command_id, param_types, params)
            .map_err(|failure| ReeSessionError::command(command_id, failure))
    }

    /// Stop the service, release its handle and close the proxy connection.
    ///
    /// Failures of the two remote steps are logged and do not stop the
    /// sequence. The connection is always closed.
    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };

        let failed = [GENERIC_SERVICE_STOP, GENERIC_CLOSE]
            .into_iter()
            .filter_map(|command_id| best_effort(&mut connection, self.handle, command_id))
            .count();

        connection.close();

        if failed == 0 {
            info!("Closed REE session {}", self.handle);
        } else {
            warn!(
                "Closed REE session {} with {} failed teardown step(s)",
                self.handle, failed
            );
        }
    }
}

impl<S: TaSession> Drop for ReeSession<S> {
    fn drop(&mut self) {
        if self.connection.is_some() {
            warn!("REE session {} dropped without close", self.handle);
            self.teardown();
        }
    }
}

impl<S: TaSession> fmt::Debug for ReeSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReeSession")
            .field("handle", &self.handle)
            .field("open", &self.connection.is_some())
            .finish()
    }
}

/// Ask the proxy for the handle of `destination`.
fn resolve<S: TaSession>(connection: &mut S, destination: &TeeUuid) -> Result<ServiceHandle> {
    let mut params = Params::new().with(0, Param::memref(destination.to_bytes().to_vec()));

    connection
        .invoke_command(Timeout::ZERO, GENERIC_OPEN, RESOLVE_PARAM_TYPES, &mut params)
        .map_err(|failure| ReeSessionError::command(GENERIC_OPEN, failure))?;

    let (a, b) = params.value(1).ok_or(ReeSessionError::Command {
        command: GENERIC_OPEN,
        code: TeeErrorCode::BAD_FORMAT,
        origin: ReturnOrigin::Api,
    })?;
    Ok(ServiceHandle::from_words(a, b))
}

/// Send a handle-only teardown command, logging instead of propagating.
fn best_effort<S: TaSession>(
    connection: &mut S,
    handle: ServiceHandle,
    command_id: u32,
) -> Option<InvokeFailure> {
    let mut params = Params::new();
    let param_types = inject_handle(handle, ParamTypes::NONE, &mut params);

    match connection.invoke_command(Timeout::ZERO, command_id, param_types, &mut params) {
        Ok(()) => None,
        Err(failure) => {
            error!(
                "Teardown step {} failed for REE session {}: {} (origin {})",
                command_name(command_id),
                handle,
                failure.code,
                failure.origin
            );
            Some(failure)
        }
    }
}
