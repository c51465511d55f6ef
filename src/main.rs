//! ree-session binary entry point.
//!
//! Registers an echo service on the loopback proxy, opens a session with it,
//! invokes one command and closes the session again.

use std::process::ExitCode;

use ree_session::cli::{self, Args};
use ree_session::config::Config;
use ree_session::loopback::{EchoService, LoopbackProxy};
use ree_session::{logging, Param, ParamType, ParamTypes, Params, ReeSession};
use tracing::{error, info};

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run 'ree-session --help' for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> ree_session::Result<()> {
    let config = Config::load(args)?;
    logging::try_init_with_filter(config.log_filter()).ok();

    info!("ree-session v{}", env!("CARGO_PKG_VERSION"));

    let service = config.service()?;
    let proxy = LoopbackProxy::new();
    proxy.register(service, || EchoService);

    let mut session = ReeSession::open(&proxy, &service, config.timeout(), ParamTypes::NONE, None)?;

    let types = ParamTypes::new(
        ParamType::None,
        ParamType::ValueInput,
        ParamType::ValueOutput,
        ParamType::None,
    );
    let mut params = Params::new().with(1, Param::value(args.value, 0));
    let outcome = session.invoke(
        config.timeout(),
        config.session.command,
        types,
        Some(&mut params),
    );
    let handle = session.handle();
    session.close();
    outcome?;

    let summary = serde_json::json!({
        "service": service,
        "handle": handle.to_string(),
        "command": config.session.command,
        "sent": args.value,
        "echoed": params.value(2).map(|(a, _)| a),
    });
    println!("{}", summary);

    Ok(())
}
