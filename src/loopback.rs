//! In-process generic proxy.
//!
//! [`LoopbackProxy`] plays the roles of the generic proxy and the supplicant
//! at once: REE services are registered by UUID and dispatched to directly.
//! Every connection and invocation is journaled, and failures can be
//! injected per command, which makes it the harness for exercising
//! [`ReeSession`](crate::ReeSession) without a secure OS.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::error::{InvokeFailure, ReturnOrigin, TeeErrorCode};
use crate::param::{Param, ParamType, ParamTypes, Params};
use crate::protocol::{
    command_name, is_proxy_command, Timeout, GENERIC_CLOSE, GENERIC_OPEN, GENERIC_PROXY_UUID,
    GENERIC_SERVICE_START, GENERIC_SERVICE_STOP,
};
use crate::proxy::{TaConnector, TaSession};
use crate::session::ServiceHandle;
use crate::uuid::TeeUuid;

/// A service living in the REE, reached through the proxy.
pub trait ReeService: Send {
    /// Prepare for requests from a newly opened session.
    fn start(&mut self, _params: &mut Params) -> Result<(), TeeErrorCode> {
        Ok(())
    }

    /// Quiesce before the handle is released.
    fn stop(&mut self) -> Result<(), TeeErrorCode> {
        Ok(())
    }

    /// Handle a service-defined command.
    fn invoke(
        &mut self,
        command_id: u32,
        param_types: ParamTypes,
        params: &mut Params,
    ) -> Result<(), TeeErrorCode>;
}

/// Service that copies slot 1 into slot 2 for every command.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoService;

impl ReeService for EchoService {
    fn invoke(
        &mut self,
        _command_id: u32,
        _param_types: ParamTypes,
        params: &mut Params,
    ) -> Result<(), TeeErrorCode> {
        params[2] = params[1].clone();
        Ok(())
    }
}

type ServiceFactory = Box<dyn Fn() -> Box<dyn ReeService> + Send + Sync>;

/// One entry of the proxy journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyEvent {
    /// A connection was opened.
    Connect { connection: u64 },
    /// A connection attempt was refused.
    ConnectRejected { code: TeeErrorCode },
    /// A command arrived, as seen before dispatch.
    Invoke {
        connection: u64,
        command_id: u32,
        timeout: Timeout,
        param_types: ParamTypes,
        slot0: Param,
    },
    /// A connection was closed.
    Disconnect { connection: u64 },
}

struct Resolved {
    connection: u64,
    service: Box<dyn ReeService>,
}

struct ProxyState {
    services: HashMap<TeeUuid, ServiceFactory>,
    resolved: HashMap<ServiceHandle, Resolved>,
    events: Vec<ProxyEvent>,
    open_error: Option<TeeErrorCode>,
    failing: HashMap<u32, TeeErrorCode>,
    next_connection: u64,
    next_handle: u64,
    open_connections: usize,
}

impl Default for ProxyState {
    fn default() -> Self {
        Self {
            services: HashMap::new(),
            resolved: HashMap::new(),
            events: Vec::new(),
            open_error: None,
            failing: HashMap::new(),
            next_connection: 1,
            next_handle: 1,
            open_connections: 0,
        }
    }
}

/// Thread-safe in-process proxy. Clones share the same state.
#[derive(Clone, Default)]
pub struct LoopbackProxy {
    state: Arc<Mutex<ProxyState>>,
}

impl LoopbackProxy {
    /// Create a proxy with no registered services.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under `uuid`; every resolve gets a fresh instance.
    pub fn register<F, R>(&self, uuid: TeeUuid, factory: F)
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: ReeService + 'static,
    {
        if let Ok(mut state) = self.state.lock() {
            state
                .services
                .insert(uuid, Box::new(move || Box::new(factory()) as Box<dyn ReeService>));
        }
    }

    /// Make the next handle issued equal to `handle`.
    pub fn set_next_handle(&self, handle: u64) {
        if let Ok(mut state) = self.state.lock() {
            state.next_handle = handle;
        }
    }

    /// Refuse every new connection with `code`.
    pub fn fail_open(&self, code: TeeErrorCode) {
        if let Ok(mut state) = self.state.lock() {
            state.open_error = Some(code);
        }
    }

    /// Fail every invocation of `command_id` with `code`.
    pub fn fail_command(&self, command_id: u32, code: TeeErrorCode) {
        if let Ok(mut state) = self.state.lock() {
            state.failing.insert(command_id, code);
        }
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.open_error = None;
            state.failing.clear();
        }
    }

    /// Snapshot of the journal.
    pub fn events(&self) -> Vec<ProxyEvent> {
        self.state
            .lock()
            .map(|s| s.events.clone())
            .unwrap_or_default()
    }

    /// Command ids received, in order.
    pub fn commands(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProxyEvent::Invoke { command_id, .. } => Some(command_id),
                _ => None,
            })
            .collect()
    }

    /// Number of connections currently open.
    pub fn open_connections(&self) -> usize {
        self.state.lock().map(|s| s.open_connections).unwrap_or(0)
    }

    /// Number of service handles not yet released.
    pub fn live_handles(&self) -> usize {
        self.state.lock().map(|s| s.resolved.len()).unwrap_or(0)
    }
}

impl TaConnector for LoopbackProxy {
    type Session = LoopbackSession;

    fn open_session(
        &self,
        destination: &TeeUuid,
        _timeout: Timeout,
    ) -> Result<LoopbackSession, TeeErrorCode> {
        let mut state = lock(&self.state).map_err(|f| f.code)?;

        if *destination != GENERIC_PROXY_UUID {
            state.events.push(ProxyEvent::ConnectRejected {
                code: TeeErrorCode::ITEM_NOT_FOUND,
            });
            return Err(TeeErrorCode::ITEM_NOT_FOUND);
        }
        if let Some(code) = state.open_error {
            state.events.push(ProxyEvent::ConnectRejected { code });
            return Err(code);
        }

        let connection = state.next_connection;
        state.next_connection += 1;
        state.open_connections += 1;
        state.events.push(ProxyEvent::Connect { connection });
        debug!("Loopback proxy: connection {} opened", connection);

        Ok(LoopbackSession {
            state: Arc::clone(&self.state),
            connection,
        })
    }
}

/// A connection to a [`LoopbackProxy`].
pub struct LoopbackSession {
    state: Arc<Mutex<ProxyState>>,
    connection: u64,
}

impl LoopbackSession {
    pub fn id(&self) -> u64 {
        self.connection
    }
}

impl TaSession for LoopbackSession {
    fn invoke_command(
        &mut self,
        timeout: Timeout,
        command_id: u32,
        param_types: ParamTypes,
        params: &mut Params,
    ) -> Result<(), InvokeFailure> {
        let mut state = lock(&self.state)?;
        state.events.push(ProxyEvent::Invoke {
            connection: self.connection,
            command_id,
            timeout,
            param_types,
            slot0: params[0].clone(),
        });
        trace!(
            "Loopback proxy: {} on connection {}",
            command_name(command_id),
            self.connection
        );

        if let Some(&code) = state.failing.get(&command_id) {
            return Err(InvokeFailure::new(code, ReturnOrigin::TrustedApp));
        }

        if command_id == GENERIC_OPEN {
            return state.resolve(self.connection, params).map_err(from_service);
        }

        let handle = session_token(param_types, params).map_err(from_service)?;
        let result = match command_id {
            GENERIC_CLOSE => state.release(self.connection, handle).map(|_| ()),
            GENERIC_SERVICE_START => state
                .lookup(self.connection, handle)?
                .service
                .start(params),
            GENERIC_SERVICE_STOP => state.lookup(self.connection, handle)?.service.stop(),
            id if is_proxy_command(id) => Err(TeeErrorCode::NOT_SUPPORTED),
            _ => state
                .lookup(self.connection, handle)?
                .service
                .invoke(command_id, param_types, params),
        };
        result.map_err(from_service)
    }

    fn close(self) {
        if let Ok(mut state) = self.state.lock() {
            let connection = self.connection;
            state.resolved.retain(|_, r| r.connection != connection);
            state.open_connections = state.open_connections.saturating_sub(1);
            state.events.push(ProxyEvent::Disconnect { connection });
            debug!("Loopback proxy: connection {} closed", connection);
        }
    }
}

impl ProxyState {
    fn resolve(&mut self, connection: u64, params: &mut Params) -> Result<(), TeeErrorCode> {
        let uuid = params
            .memref(0)
            .and_then(TeeUuid::from_bytes)
            .ok_or(TeeErrorCode::BAD_PARAMETERS)?;
        let factory = self
            .services
            .get(&uuid)
            .ok_or(TeeErrorCode::ITEM_NOT_FOUND)?;
        let service = factory();

        let mut handle = ServiceHandle::from_raw(self.next_handle);
        while self.resolved.contains_key(&handle) {
            handle = ServiceHandle::from_raw(handle.as_u64().wrapping_add(1));
        }
        self.next_handle = handle.as_u64().wrapping_add(1);
        self.resolved.insert(
            handle,
            Resolved {
                connection,
                service,
            },
        );

        let (a, b) = handle.to_words();
        params[1] = Param::Value { a, b };
        debug!("Loopback proxy: resolved {} to {}", uuid, handle);
        Ok(())
    }

    fn lookup(
        &mut self,
        connection: u64,
        handle: ServiceHandle,
    ) -> Result<&mut Resolved, InvokeFailure> {
        match self.resolved.get_mut(&handle) {
            Some(r) if r.connection == connection => Ok(r),
            _ => Err(from_service(TeeErrorCode::BAD_PARAMETERS)),
        }
    }

    fn release(&mut self, connection: u64, handle: ServiceHandle) -> Result<Resolved, TeeErrorCode> {
        let owned = self
            .resolved
            .get(&handle)
            .is_some_and(|r| r.connection == connection);
        if !owned {
            return Err(TeeErrorCode::BAD_PARAMETERS);
        }
        debug!("Loopback proxy: released {}", handle);
        self.resolved
            .remove(&handle)
            .ok_or(TeeErrorCode::BAD_PARAMETERS)
    }
}

/// Read the handle carried in slot 0.
fn session_token(param_types: ParamTypes, params: &Params) -> Result<ServiceHandle, TeeErrorCode> {
    match (param_types.get(0), params.value(0)) {
        (Ok(ParamType::ValueInput), Some((a, b))) => Ok(ServiceHandle::from_words(a, b)),
        _ => Err(TeeErrorCode::BAD_PARAMETERS),
    }
}

fn from_service(code: TeeErrorCode) -> InvokeFailure {
    InvokeFailure::new(code, ReturnOrigin::TrustedApp)
}

fn lock(state: &Mutex<ProxyState>) -> Result<MutexGuard<'_, ProxyState>, InvokeFailure> {
    state
        .lock()
        .map_err(|_| InvokeFailure::new(TeeErrorCode::GENERIC, ReturnOrigin::Tee))
}
