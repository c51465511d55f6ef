//! Session integration tests.
//!
//! These tests drive full session lifecycles against the loopback proxy.

use ree_session::loopback::{EchoService, LoopbackProxy, ProxyEvent, ReeService};
use ree_session::protocol::{
    GENERIC_CLOSE, GENERIC_OPEN, GENERIC_SERVICE_START, GENERIC_SERVICE_STOP,
};
use ree_session::{
    Param, ParamType, ParamTypes, Params, ReeSession, ReeSessionError, ReturnOrigin,
    TeeErrorCode, TeeUuid, Timeout,
};

const SERVICE: TeeUuid = TeeUuid::new(
    0x8aaa_f200,
    0x2450,
    0x11e4,
    [0xab, 0xe2, 0x00, 0x02, 0xa5, 0xd5, 0xc5, 0x1b],
);

fn proxy_with_echo(uuid: TeeUuid) -> LoopbackProxy {
    let proxy = LoopbackProxy::new();
    proxy.register(uuid, || EchoService);
    proxy
}

fn slot0_values(proxy: &LoopbackProxy) -> Vec<(u32, Param)> {
    proxy
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ProxyEvent::Invoke {
                command_id, slot0, ..
            } => Some((command_id, slot0)),
            _ => None,
        })
        .collect()
}

/// Counts start/stop calls and fails start on demand.
struct Lifecycle {
    fail_start: bool,
}

impl ReeService for Lifecycle {
    fn start(&mut self, params: &mut Params) -> Result<(), TeeErrorCode> {
        if self.fail_start {
            return Err(TeeErrorCode::NOT_SUPPORTED);
        }
        // Reports the init argument back through slot 2
        params[2] = params[1].clone();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TeeErrorCode> {
        Err(TeeErrorCode::BUSY)
    }

    fn invoke(
        &mut self,
        _command_id: u32,
        _param_types: ParamTypes,
        _params: &mut Params,
    ) -> Result<(), TeeErrorCode> {
        Err(TeeErrorCode::NOT_SUPPORTED)
    }
}

// ============================================================================
// Establishment
// ============================================================================

#[test]
fn test_nil_uuid_resolves_to_handle_42() {
    let proxy = proxy_with_echo(TeeUuid::NIL);
    proxy.set_next_handle(42);

    let mut session = ReeSession::open(
        &proxy,
        &TeeUuid::NIL,
        Timeout::INFINITE,
        ParamTypes::NONE,
        None,
    )
    .unwrap();
    assert_eq!(session.handle().as_u64(), 42);

    let mut params = Params::new().with(0, Param::value(999, 0));
    session
        .invoke(Timeout::INFINITE, 7, ParamTypes::NONE, Some(&mut params))
        .unwrap();

    let sent = slot0_values(&proxy);
    let (command_id, slot0) = sent.last().cloned().unwrap();
    assert_eq!(command_id, 7);
    assert_eq!(slot0, Param::value(42, 0));

    session.close();
}

#[test]
fn test_open_passes_caller_params_to_start() {
    let proxy = LoopbackProxy::new();
    proxy.register(SERVICE, || Lifecycle { fail_start: false });

    let mut params = Params::new()
        .with(0, Param::memref(b"discarded".to_vec()))
        .with(1, Param::value(11, 22));
    let types = ParamTypes::new(
        ParamType::MemrefInput,
        ParamType::ValueInput,
        ParamType::ValueOutput,
        ParamType::None,
    );

    let session = ReeSession::open(
        &proxy,
        &SERVICE,
        Timeout::from_millis(500),
        types,
        Some(&mut params),
    )
    .unwrap();

    assert_eq!(params.value(2), Some((11, 22)));
    let (a, b) = session.handle().to_words();
    assert_eq!(params.value(0), Some((a, b)));

    let start = proxy
        .events()
        .into_iter()
        .find_map(|e| match e {
            ProxyEvent::Invoke {
                command_id: GENERIC_SERVICE_START,
                timeout,
                param_types,
                ..
            } => Some((timeout, param_types)),
            _ => None,
        })
        .unwrap();
    assert_eq!(start.0, Timeout::from_millis(500));
    assert_eq!(start.1.raw(), (types.raw() & !0xF) | 1);

    session.close();
}

#[test]
fn test_connect_failure_leaves_nothing_open() {
    let proxy = proxy_with_echo(SERVICE);
    proxy.fail_open(TeeErrorCode::TARGET_DEAD);

    let err = ReeSession::open(&proxy, &SERVICE, Timeout::ZERO, ParamTypes::NONE, None)
        .unwrap_err();

    assert_eq!(err.code(), TeeErrorCode::TARGET_DEAD);
    assert!(err.origin().is_none());
    assert_eq!(proxy.open_connections(), 0);
    assert!(proxy.commands().is_empty());
}

#[test]
fn test_unknown_service_unwinds_connection() {
    let proxy = LoopbackProxy::new();

    let err = ReeSession::open(&proxy, &SERVICE, Timeout::ZERO, ParamTypes::NONE, None)
        .unwrap_err();

    assert_eq!(
        err,
        ReeSessionError::Command {
            command: GENERIC_OPEN,
            code: TeeErrorCode::ITEM_NOT_FOUND,
            origin: ReturnOrigin::TrustedApp,
        }
    );
    assert_eq!(proxy.open_connections(), 0);
    assert_eq!(proxy.commands(), vec![GENERIC_OPEN]);
}

#[test]
fn test_start_failure_returns_start_code() {
    let proxy = LoopbackProxy::new();
    proxy.register(SERVICE, || Lifecycle { fail_start: true });

    let err = ReeSession::open(&proxy, &SERVICE, Timeout::ZERO, ParamTypes::NONE, None)
        .unwrap_err();

    assert_eq!(err.code(), TeeErrorCode::NOT_SUPPORTED);
    assert!(matches!(
        err,
        ReeSessionError::Command {
            command: GENERIC_SERVICE_START,
            ..
        }
    ));
    assert_eq!(proxy.open_connections(), 0);
    assert_eq!(proxy.live_handles(), 0);
}

#[test]
fn test_open_forwards_undeclared_content() {
    let proxy = proxy_with_echo(SERVICE);
    let mut params = Params::new().with(3, Param::value(1, 2));
    let types = ParamTypes::NONE
        .with_slot(3, ParamType::MemrefInout)
        .unwrap();

    let session =
        ReeSession::open(&proxy, &SERVICE, Timeout::ZERO, types, Some(&mut params)).unwrap();

    let start_types = proxy.events().into_iter().find_map(|e| match e {
        ProxyEvent::Invoke {
            command_id: GENERIC_SERVICE_START,
            param_types,
            ..
        } => Some(param_types.raw()),
        _ => None,
    });
    assert_eq!(start_types, Some(0x7001));
    assert_eq!(params[3], Param::value(1, 2));
    session.close();
}

// ============================================================================
// Invocation
// ============================================================================

#[test]
fn test_low_command_ids_reach_service() {
    let proxy = proxy_with_echo(SERVICE);
    let mut session =
        ReeSession::open(&proxy, &SERVICE, Timeout::ZERO, ParamTypes::NONE, None).unwrap();
    let types = ParamTypes::new(
        ParamType::None,
        ParamType::ValueInput,
        ParamType::ValueOutput,
        ParamType::None,
    );

    for (command_id, sent) in [(0, 11), (1, 22), (7, 33)] {
        let mut params = Params::new().with(1, Param::value(sent, 0));
        session
            .invoke(Timeout::ZERO, command_id, types, Some(&mut params))
            .unwrap();
        assert_eq!(params.value(2), Some((sent, 0)));
        assert_eq!(proxy.live_handles(), 1);
    }
    session.close();

    assert_eq!(
        proxy.commands(),
        vec![
            GENERIC_OPEN,
            GENERIC_SERVICE_START,
            0,
            1,
            7,
            GENERIC_SERVICE_STOP,
            GENERIC_CLOSE,
        ]
    );
    assert_eq!(proxy.live_handles(), 0);
}

#[test]
fn test_every_command_carries_same_handle() {
    let proxy = proxy_with_echo(SERVICE);
    proxy.set_next_handle(0x1_0000_0007);
    let mut session =
        ReeSession::open(&proxy, &SERVICE, Timeout::ZERO, ParamTypes::NONE, None).unwrap();

    let caller_slot0 = [
        Param::None,
        Param::value(999, 999),
        Param::memref(vec![0xFF; 8]),
    ];
    for (i, slot0) in caller_slot0.into_iter().enumerate() {
        let mut params = Params::new().with(0, slot0);
        session
            .invoke(Timeout::ZERO, 100 + i as u32, ParamTypes::NONE, Some(&mut params))
            .unwrap();
    }
    session.invoke(Timeout::ZERO, 200, ParamTypes::NONE, None).unwrap();
    session.close();

    let expected = Param::value(7, 1);
    let sent = slot0_values(&proxy);
    assert!(sent
        .iter()
        .filter(|(command_id, _)| *command_id != GENERIC_OPEN)
        .all(|(_, slot0)| *slot0 == expected));
}

#[test]
fn test_invoke_returns_service_outputs() {
    let proxy = proxy_with_echo(SERVICE);
    let mut session =
        ReeSession::open(&proxy, &SERVICE, Timeout::ZERO, ParamTypes::NONE, None).unwrap();

    let types = ParamTypes::new(
        ParamType::None,
        ParamType::MemrefInput,
        ParamType::MemrefOutput,
        ParamType::None,
    );
    let mut params = Params::new().with(1, Param::memref(b"ping".to_vec()));
    session
        .invoke(Timeout::INFINITE, 0x42, types, Some(&mut params))
        .unwrap();

    assert_eq!(params.memref(2), Some(&b"ping"[..]));
    session.close();
}

#[test]
fn test_invoke_failure_is_verbatim() {
    let proxy = LoopbackProxy::new();
    proxy.register(SERVICE, || Lifecycle { fail_start: false });
    let mut session =
        ReeSession::open(&proxy, &SERVICE, Timeout::ZERO, ParamTypes::NONE, None).unwrap();

    let err = session
        .invoke(Timeout::ZERO, 9, ParamTypes::NONE, None)
        .unwrap_err();
    assert_eq!(
        err,
        ReeSessionError::Command {
            command: 9,
            code: TeeErrorCode::NOT_SUPPORTED,
            origin: ReturnOrigin::TrustedApp,
        }
    );

    // The session stays usable after a failed command
    proxy.fail_command(9, TeeErrorCode::BUSY);
    let err = session
        .invoke(Timeout::ZERO, 9, ParamTypes::NONE, None)
        .unwrap_err();
    assert_eq!(err.code(), TeeErrorCode::BUSY);

    session.close();
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn test_close_sequence() {
    let proxy = proxy_with_echo(SERVICE);
    let session =
        ReeSession::open(&proxy, &SERVICE, Timeout::ZERO, ParamTypes::NONE, None).unwrap();

    session.close();

    assert_eq!(
        proxy.commands(),
        vec![
            GENERIC_OPEN,
            GENERIC_SERVICE_START,
            GENERIC_SERVICE_STOP,
            GENERIC_CLOSE
        ]
    );
    assert!(matches!(
        proxy.events().last(),
        Some(ProxyEvent::Disconnect { .. })
    ));
    assert_eq!(proxy.open_connections(), 0);
    assert_eq!(proxy.live_handles(), 0);
}

#[test]
fn test_close_continues_after_stop_failure() {
    let proxy = LoopbackProxy::new();
    proxy.register(SERVICE, || Lifecycle { fail_start: false });
    let session =
        ReeSession::open(&proxy, &SERVICE, Timeout::ZERO, ParamTypes::NONE, None).unwrap();

    session.close();

    let commands = proxy.commands();
    assert_eq!(&commands[2..], &[GENERIC_SERVICE_STOP, GENERIC_CLOSE]);
    assert_eq!(proxy.open_connections(), 0);
    assert_eq!(proxy.live_handles(), 0);
}

#[test]
fn test_close_when_both_steps_fail() {
    let proxy = proxy_with_echo(SERVICE);
    let session =
        ReeSession::open(&proxy, &SERVICE, Timeout::ZERO, ParamTypes::NONE, None).unwrap();
    proxy.fail_command(GENERIC_SERVICE_STOP, TeeErrorCode::COMMUNICATION);
    proxy.fail_command(GENERIC_CLOSE, TeeErrorCode::COMMUNICATION);

    session.close();

    assert_eq!(
        &proxy.commands()[2..],
        &[GENERIC_SERVICE_STOP, GENERIC_CLOSE]
    );
    assert_eq!(proxy.open_connections(), 0);
}

#[test]
fn test_sessions_use_separate_connections() {
    let proxy = proxy_with_echo(SERVICE);
    let first =
        ReeSession::open(&proxy, &SERVICE, Timeout::ZERO, ParamTypes::NONE, None).unwrap();
    let second =
        ReeSession::open(&proxy, &SERVICE, Timeout::ZERO, ParamTypes::NONE, None).unwrap();

    assert_ne!(first.handle(), second.handle());
    assert_eq!(proxy.open_connections(), 2);

    first.close();
    assert_eq!(proxy.open_connections(), 1);
    assert_eq!(proxy.live_handles(), 1);

    second.close();
    assert_eq!(proxy.open_connections(), 0);
}

#[test]
fn test_dropped_session_is_torn_down() {
    let proxy = proxy_with_echo(SERVICE);
    drop(ReeSession::open(&proxy, &SERVICE, Timeout::ZERO, ParamTypes::NONE, None).unwrap());

    assert_eq!(proxy.open_connections(), 0);
    assert_eq!(proxy.live_handles(), 0);
    assert_eq!(proxy.commands().len(), 4);
}
