#![cfg(feature = "loopback")]

//! Drive a complete login from a native app: a one-shot local HTTP server
//! catches the provider's redirect so no browser-side code is needed.

use std::net::SocketAddr;
use std::sync::Arc;

use rouille::Server;
use tokio::sync::mpsc;
use url::Url;

use solid_authn_common::http_client::HttpClient;

use crate::error::{Error, Result};
use crate::login::LoginOptions;
use crate::session::Session;
use crate::session_info::SessionInfo;

#[derive(Clone, Debug)]
pub enum LoopbackPort {
    Fixed(u16),
    Ephemeral,
}

#[derive(Clone, Debug)]
pub struct LoopbackConfig {
    pub host: String,
    pub port: LoopbackPort,
    pub open_browser: bool,
    pub timeout_ms: u64,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: LoopbackPort::Fixed(4000),
            open_browser: true,
            timeout_ms: 5 * 60 * 1000,
        }
    }
}

#[cfg(feature = "browser-open")]
fn try_open_in_browser(url: &str) -> bool {
    webbrowser::open(url).is_ok()
}
#[cfg(not(feature = "browser-open"))]
fn try_open_in_browser(_url: &str) -> bool {
    false
}

// Forwards the raw query string; the caller reassembles the full redirect
// URL since only it knows the bound port.
fn callback_router(request: &rouille::Request, tx: &mpsc::Sender<String>) -> rouille::Response {
    if request.method() == "GET" && request.url() == "/callback" {
        let _ = tx.try_send(request.raw_query_string().to_owned());
        rouille::Response::text("Logged in! You can close this tab.")
    } else {
        rouille::Response::empty_404()
    }
}

struct CallbackHandle {
    #[allow(dead_code)]
    server_handle: std::thread::JoinHandle<()>,
    server_stop: std::sync::mpsc::Sender<()>,
    callback_rx: mpsc::Receiver<String>,
}

fn one_shot_server(addr: SocketAddr) -> Result<(SocketAddr, CallbackHandle)> {
    let (tx, callback_rx) = mpsc::channel(5);
    let server = Server::new(addr, move |request| callback_router(request, &tx))
        .map_err(|e| Error::Configuration(format!("could not start loopback server: {e}")))?;
    let local_addr = server.server_addr();
    let (server_handle, server_stop) = server.stoppable();
    Ok((
        local_addr,
        CallbackHandle {
            server_handle,
            server_stop,
            callback_rx,
        },
    ))
}

impl<T> Session<T>
where
    T: HttpClient + Send + Sync + 'static,
{
    /// Run the full login flow against a loopback redirect.
    ///
    /// Starts a local server, rewrites the options' redirect URL to point
    /// at it, opens the authorization URL (in the system browser when
    /// configured, otherwise printing it for copy/paste), and completes
    /// the login from the captured redirect.
    pub async fn login_with_local_server(
        &self,
        mut options: LoginOptions,
        cfg: LoopbackConfig,
    ) -> Result<SessionInfo> {
        let port = match cfg.port {
            LoopbackPort::Fixed(p) => p,
            LoopbackPort::Ephemeral => 0,
        };
        let bind_addr: SocketAddr = format!("{}:{port}", cfg.host)
            .parse()
            .map_err(|e| Error::Configuration(format!("invalid loopback host/port: {e}")))?;
        let (local_addr, handle) = one_shot_server(bind_addr)?;

        let redirect = Url::parse(&format!(
            "http://{}:{}/callback",
            cfg.host,
            local_addr.port()
        ))
        .map_err(|e| Error::Configuration(format!("invalid loopback host: {e}")))?;
        options.redirect_url = Some(redirect.clone());
        let open_browser = cfg.open_browser;
        options.handle_redirect = Some(Arc::new(move |url: &Url| {
            println!("To authenticate with your identity provider, visit:\n{url}\n");
            if open_browser {
                let _ = try_open_in_browser(url.as_str());
            }
        }));

        self.login(options).await?;

        let mut callback_rx = handle.callback_rx;
        let callback = tokio::time::timeout(
            std::time::Duration::from_millis(cfg.timeout_ms),
            callback_rx.recv(),
        )
        .await;
        let _ = handle.server_stop.send(());

        let Ok(Some(query)) = callback else {
            return Err(Error::Redirect(
                "timed out waiting for the login redirect".into(),
            ));
        };
        let callback_url = format!("{redirect}?{query}");
        self.handle_incoming_redirect(&callback_url)
            .await?
            .ok_or_else(|| Error::Redirect("another redirect was already being handled".into()))
    }
}
