use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use stevedore_engine::EngineClient;
use stevedore_supervisor::Registry;

use crate::error::{io_err, DaemonError};
use crate::paths;
use crate::protocol::{Command, Reply};

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking() -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(
        paths::services_root(),
        paths::control_socket(),
        paths::engine_socket(),
    ))
}

/// Run the daemon runtime: load the registry, serve the control socket, and
/// on shutdown stop every running service before returning.
pub async fn run(
    root: PathBuf,
    socket: PathBuf,
    engine_socket: PathBuf,
) -> Result<(), DaemonError> {
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }

    let engine = EngineClient::new(engine_socket);
    let registry = Arc::new(Registry::new(&root, engine));

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    Arc::clone(&registry)
        .load_all(shutdown_tx.subscribe())
        .await?;

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let registry = Arc::clone(&registry);
        let socket = socket.clone();
        tokio::spawn(async move {
            let result = socket_server_task(socket, registry, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = signal_task(shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let (socket_result, signal_result) = tokio::join!(socket_handle, signal_handle);

    // Control surface is down; take the running containers with us before
    // surfacing any task fault.
    registry.stop_all().await;

    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn socket_server_task(
    socket: PathBuf,
    registry: Arc<Registry>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    if let Some(parent) = socket.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    tracing::info!(socket = %socket.display(), "control socket listening");

    let served = loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break Ok(()),
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => {
                        let registry = Arc::clone(&registry);
                        tokio::spawn(async move {
                            if let Err(err) = handle_client(stream, registry).await {
                                tracing::error!(error = %err, "control client error");
                            }
                        });
                    }
                    Err(err) => break Err(io_err(&socket, err)),
                }
            }
        }
    };

    // The socket file belongs to this listener from bind onward; remove it
    // whether the loop ended by shutdown or by fault.
    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    served
}

/// Serve one client connection: newline-delimited JSON commands in, one
/// reply line out per command, until the client hangs up.
async fn handle_client(stream: UnixStream, registry: Arc<Registry>) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("control socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Command>(&line) {
            Ok(command) => dispatch(command, &registry).await,
            Err(err) => Reply::error(format!("invalid request JSON: {err}")),
        };
        write_reply(&mut writer, &reply).await?;
    }
    Ok(())
}

/// Translate one decoded command into one reply envelope. Lifecycle commands
/// validate up front and reply as soon as the operation is issued; progress
/// shows up in subsequent `list` replies.
async fn dispatch(command: Command, registry: &Registry) -> Reply {
    match command {
        Command::Start { service } => match registry.start(&service).await {
            Ok(()) => Reply::info(format!("service '{service}' started")),
            Err(err) => Reply::error(err.to_string()),
        },
        Command::Stop { service } => match registry.stop(&service).await {
            Ok(()) => Reply::info(format!("service '{service}' stopped")),
            Err(err) => Reply::error(err.to_string()),
        },
        Command::Install { service } => match registry.install(&service).await {
            Ok(()) => Reply::info(format!("service '{service}' installed")),
            Err(err) => Reply::error(err.to_string()),
        },
        Command::Load { service } => {
            if registry.load(&service).await {
                Reply::info(format!("service '{service}' loaded"))
            } else {
                Reply::error(format!("could not load service '{service}'"))
            }
        }
        Command::List => Reply::Services(registry.list().await),
    }
}

async fn signal_task(mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), DaemonError> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(|e| io_err("sigterm-handler", e))?;
    tokio::select! {
        _ = shutdown_rx.recv() => Ok(()),
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    tracing::info!("received ctrl-c, shutting down daemon");
                    Ok(())
                }
                Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
            }
        }
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM, shutting down daemon");
            Ok(())
        }
    }
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "control socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale control socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_reply(writer: &mut OwnedWriteHalf, reply: &Reply) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(reply)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("control socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("control socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("control socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
