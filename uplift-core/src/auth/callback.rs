//! One-shot loopback listener that captures the OAuth authorization redirect.
//!
//! The listener owns the bound port. [`RedirectListener::wait`] consumes it,
//! so the port is released on every exit path (capture, denial, timeout,
//! cancellation, I/O error) when the socket is dropped.

use super::error::AuthError;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Path the authorization server redirects to.
pub const CALLBACK_PATH: &str = "/";

const MAX_REQUEST_BYTES: usize = 8192;

/// How long a connection may stay silent before it is dropped.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

const SUCCESS_HTML: &str = "<html><head><title>Uplift</title></head><body>\
<p>You can close this window now. Return to the app to continue.</p></body></html>";
const DENIED_HTML: &str = "<html><head><title>Uplift</title></head><body>\
<p>Authorization was not granted. You can close this window now.</p></body></html>";
const NOT_FOUND_HTML: &str = "<html><body><p>Not found</p></body></html>";

/// Query parameters carried by the redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl RedirectParams {
    /// A redirect is one that carries either a `code` or an `error`.
    fn is_redirect(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }
}

/// Authorization code and state captured from a successful redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRedirect {
    pub code: String,
    pub state: String,
}

/// Loopback listener bound to an OS-assigned port.
#[derive(Debug)]
pub struct RedirectListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl RedirectListener {
    /// Bind `127.0.0.1:0`.
    pub async fn bind() -> Result<Self, AuthError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(|e| AuthError::Redirect(format!("bind 127.0.0.1:0 failed: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| AuthError::Redirect(format!("local_addr failed: {e}")))?;
        debug!(%addr, "Redirect listener bound");
        Ok(Self { listener, addr })
    }

    /// Port assigned by the OS.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Exact redirect URI to advertise to the authorization server.
    pub fn redirect_uri(&self) -> String {
        format!("http://{}:{}{}", self.addr.ip(), self.addr.port(), CALLBACK_PATH)
    }

    /// Wait for the redirect, acknowledge it to the browser and release the port.
    ///
    /// Requests that are not the redirect (favicon fetches, speculative
    /// connections that send nothing) get a 404 and are otherwise ignored.
    pub async fn wait(
        self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<CapturedRedirect, AuthError> {
        let port = self.port();
        info!(port, "Waiting for authorization redirect");

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(AuthError::Cancelled),
            outcome = tokio::time::timeout(timeout, self.accept_redirect()) => {
                outcome.unwrap_or(Err(AuthError::Timeout(timeout)))
            }
        };

        // `self` and any open connections were owned by the accept future,
        // which is dropped by now.
        debug!(port, "Redirect listener released");
        let params = result?;
        into_captured(params)
    }

    /// Accept connections until one of them carries the redirect.
    ///
    /// Each connection is served on its own task, so a socket that stays
    /// idle cannot hold up the one that carries the redirect.
    async fn accept_redirect(self) -> Result<RedirectParams, AuthError> {
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (socket, peer) = accepted
                        .map_err(|e| AuthError::Redirect(format!("accept failed: {e}")))?;
                    connections.spawn(serve_connection(socket, peer));
                }
                Some(joined) = connections.join_next() => {
                    if let Ok(Some(params)) = joined {
                        return Ok(params);
                    }
                }
            }
        }
    }
}

/// Read one request from `socket` and answer it.
///
/// Returns the parameters when the request is the authorization redirect.
async fn serve_connection(mut socket: TcpStream, peer: SocketAddr) -> Option<RedirectParams> {
    let request = match tokio::time::timeout(READ_TIMEOUT, read_request(&mut socket)).await {
        Ok(Ok(request)) => request,
        Ok(Err(e)) => {
            debug!(%peer, error = %e, "Ignoring unreadable connection");
            return None;
        }
        Err(_) => {
            debug!(%peer, "Closing idle connection");
            return None;
        }
    };

    let params = extract_request_target(&request)
        .and_then(|target| parse_callback_target(target).ok());

    match params {
        Some(params) if params.is_redirect() => {
            let body = if params.error.is_some() {
                DENIED_HTML
            } else {
                SUCCESS_HTML
            };
            write_response(&mut socket, "200 OK", body).await;
            Some(params)
        }
        _ => {
            debug!(%peer, "Ignoring request that is not the authorization redirect");
            write_response(&mut socket, "404 Not Found", NOT_FOUND_HTML).await;
            None
        }
    }
}

/// Turn redirect parameters into a captured code/state pair.
fn into_captured(params: RedirectParams) -> Result<CapturedRedirect, AuthError> {
    if let Some(error) = params.error {
        warn!(%error, description = ?params.error_description, "OAuth authorization error");
        return Err(AuthError::Denied {
            error,
            description: params.error_description,
        });
    }
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(AuthError::MissingParameter("code"))?;
    let state = params
        .state
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::MissingParameter("state"))?;
    Ok(CapturedRedirect { code, state })
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }
    if buffer.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "empty request",
        ));
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

async fn write_response(socket: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = socket.write_all(response.as_bytes()).await {
        debug!(error = %e, "Failed to write redirect acknowledgment");
    }
    let _ = socket.shutdown().await;
}

/// Request target of a `GET` request line, e.g. `/?code=..&state=..`.
fn extract_request_target(request: &str) -> Option<&str> {
    let first = request.lines().next()?;
    let mut parts = first.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    (method == "GET" && !target.is_empty()).then_some(target)
}

/// Parse the query of a redirect target on [`CALLBACK_PATH`].
pub fn parse_callback_target(target: &str) -> Result<RedirectParams, AuthError> {
    let url = Url::parse(&format!("http://127.0.0.1{target}"))
        .map_err(|e| AuthError::Redirect(format!("invalid redirect target: {e}")))?;

    if url.path() != CALLBACK_PATH {
        return Err(AuthError::Redirect(format!(
            "unexpected redirect path: {}",
            url.path()
        )));
    }

    let mut params = RedirectParams::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            "error_description" => params.error_description = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(params)
}
