//! HTTP client for the container engine's Unix socket.
//!
//! Every call opens a fresh connection, sends one request, and reads the
//! reply to the end. The engine keeps no session state, so short-lived
//! connections keep the client trivially cancel-safe. [`EngineClient::exec`]
//! is the one exception: it upgrades its connection to a raw byte stream
//! and hands that stream to the caller.

use std::path::PathBuf;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper::header::{CONNECTION, CONTENT_TYPE, HOST, UPGRADE};
use hyper::upgrade::Upgraded;
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{io_err, EngineError};
use crate::wire::{
    CreateContainer, CreatedContainer, CreatedExec, ExecCreate, ExecStart, InspectedContainer,
    StatsSnapshot,
};

/// Raw byte stream of a running exec, claimed through an HTTP 101 upgrade.
pub type ExecStream = TokioIo<Upgraded>;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Client for a Docker-compatible engine listening on a Unix socket.
///
/// The client holds only the socket path; cloning it is cheap and clones
/// share nothing.
#[derive(Debug, Clone)]
pub struct EngineClient {
    socket: PathBuf,
}

impl EngineClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    /// Sends one request and returns the collected response body.
    ///
    /// The status line is not interpreted here: the engine reports failures
    /// through its body (`{"message": ...}`), and the typed wrappers decide
    /// what a given reply means.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Bytes, EngineError> {
        let stream = UnixStream::connect(&self.socket)
            .await
            .map_err(|err| io_err(&self.socket, err))?;
        let (mut sender, conn) = http1::Builder::new()
            .handshake(TokioIo::new(stream))
            .await?;
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                debug!("engine connection error: {err}");
            }
        });

        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header(HOST, "localhost")
            .header(CONNECTION, "close");
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        let payload = match body {
            Some(value) => Bytes::from(serde_json::to_vec(&value)?),
            None => Bytes::new(),
        };
        let request = builder.body(Full::new(payload))?;

        let response = sender.send_request(request).await?;
        let collected = response.into_body().collect().await?;
        Ok(collected.to_bytes())
    }

    // -----------------------------------------------------------------------
    // Container lifecycle
    // -----------------------------------------------------------------------

    /// Creates a container under the given name. A reply without an `Id`
    /// means the engine refused; the caller inspects `message` for the
    /// reason.
    pub async fn create_container(
        &self,
        name: &str,
        spec: &CreateContainer,
    ) -> Result<CreatedContainer, EngineError> {
        let bytes = self
            .request(
                Method::POST,
                &format!("/containers/create?name={name}"),
                Some(serde_json::to_value(spec)?),
            )
            .await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.request(Method::POST, &format!("/containers/{id}/start"), None)
            .await?;
        Ok(())
    }

    pub async fn stop_container(&self, id: &str) -> Result<(), EngineError> {
        self.request(Method::POST, &format!("/containers/{id}/stop"), None)
            .await?;
        Ok(())
    }

    /// Removes a container by name or id. Callers that clear stale
    /// leftovers before a create treat failure here as "nothing to remove".
    pub async fn remove_container(&self, name: &str) -> Result<(), EngineError> {
        self.request(Method::DELETE, &format!("/containers/{name}"), None)
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// Fetches the container's state. An engine error body (for a container
    /// the engine no longer knows) fails the strict decode and surfaces as
    /// [`EngineError::Decode`].
    pub async fn inspect_container(&self, id: &str) -> Result<InspectedContainer, EngineError> {
        let bytes = self
            .request(Method::GET, &format!("/containers/{id}/json"), None)
            .await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Fetches one non-streaming stats sample.
    pub async fn container_stats(&self, id: &str) -> Result<StatsSnapshot, EngineError> {
        let bytes = self
            .request(
                Method::GET,
                &format!("/containers/{id}/stats?stream=false"),
                None,
            )
            .await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    // -----------------------------------------------------------------------
    // Exec
    // -----------------------------------------------------------------------

    /// Runs a command inside a container and returns the upgraded stream
    /// carrying its interleaved output. The stream ends when the command
    /// exits.
    pub async fn exec(
        &self,
        container_id: &str,
        cmd: Vec<String>,
    ) -> Result<ExecStream, EngineError> {
        let create = ExecCreate {
            cmd,
            attach_stdout: true,
            attach_stderr: true,
            attach_stdin: false,
            tty: true,
        };
        let bytes = self
            .request(
                Method::POST,
                &format!("/containers/{container_id}/exec"),
                Some(serde_json::to_value(&create)?),
            )
            .await?;
        let created: CreatedExec = serde_json::from_slice(&bytes)?;

        // The start request rides its own connection, driven with upgrade
        // support so the 101 reply can hand us the raw stream.
        let stream = UnixStream::connect(&self.socket)
            .await
            .map_err(|err| io_err(&self.socket, err))?;
        let (mut sender, conn) = http1::Builder::new()
            .handshake(TokioIo::new(stream))
            .await?;
        tokio::spawn(async move {
            if let Err(err) = conn.with_upgrades().await {
                debug!("engine exec connection error: {err}");
            }
        });

        let payload = serde_json::to_vec(&ExecStart {
            detach: false,
            tty: true,
        })?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/exec/{}/start", created.id))
            .header(HOST, "localhost")
            .header(CONTENT_TYPE, "application/json")
            .header(CONNECTION, "Upgrade")
            .header(UPGRADE, "tcp")
            .body(Full::new(Bytes::from(payload)))?;
        let response = sender.send_request(request).await?;
        if response.status() != StatusCode::SWITCHING_PROTOCOLS {
            return Err(EngineError::UpgradeRefused {
                status: response.status().as_u16(),
            });
        }
        let upgraded = hyper::upgrade::on(response).await?;
        Ok(TokioIo::new(upgraded))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
