use relay_core::{ErrorBody, ErrorKind, InvocationPayload, ModelAdapter, RelayError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use tiny_http::{Header, Method, Request, Response, Server};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::entrypoint::handle_invocation;

/// HTTP front for [`handle_invocation`].
///
/// Requests are served one at a time on a dedicated thread; adapter calls
/// run on the tokio runtime the server was given.
pub struct InvocationServer<A> {
    server: Server,
    adapter: Arc<A>,
    default_model: String,
}

impl<A> InvocationServer<A>
where
    A: ModelAdapter + 'static,
{
    pub fn bind(addr: &str, adapter: Arc<A>, default_model: impl Into<String>) -> Result<Self> {
        let server = Server::http(addr)
            .map_err(|e| RelayError::Config(format!("Failed to bind {addr}: {e}")))?;

        Ok(Self {
            server,
            adapter,
            default_model: default_model.into(),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Serve until the listener shuts down. Blocks the calling thread, which
    /// must not be a runtime worker.
    pub fn run(self, runtime: Handle) {
        info!(
            "Invocation server listening on {:?} (provider: {}, default model: {})",
            self.local_addr(),
            self.adapter.name(),
            self.default_model
        );

        for mut request in self.server.incoming_requests() {
            let (status, body) = self.route(&mut request, &runtime);
            respond(request, status, body);
        }
    }

    /// Run the server on its own thread, driving adapter calls on the current runtime.
    pub fn spawn(self) -> thread::JoinHandle<()> {
        let runtime = Handle::current();
        thread::spawn(move || self.run(runtime))
    }

    fn route(&self, request: &mut Request, runtime: &Handle) -> (u16, String) {
        let path = request.url().split('?').next().unwrap_or("").to_string();
        let method = request.method().clone();
        debug!("{} {}", method, path);

        match (method, path.as_str()) {
            (Method::Get, "/ping") => (200, serde_json::json!({ "status": "Healthy" }).to_string()),
            (Method::Post, "/invocations") => self.invoke(request, runtime),
            _ => (404, error_body(None, format!("No route for {path}"))),
        }
    }

    fn invoke(&self, request: &mut Request, runtime: &Handle) -> (u16, String) {
        let mut raw = String::new();
        if let Err(e) = request.as_reader().read_to_string(&mut raw) {
            return (
                400,
                error_body(Some(ErrorKind::BadRequest), format!("Unreadable body: {e}")),
            );
        }

        let payload = if raw.trim().is_empty() {
            InvocationPayload::default()
        } else {
            match serde_json::from_str::<InvocationPayload>(&raw) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Rejected invocation payload: {}", e);
                    return (
                        400,
                        error_body(Some(ErrorKind::BadRequest), format!("Invalid payload: {e}")),
                    );
                }
            }
        };

        let outcome = runtime.block_on(handle_invocation(
            self.adapter.as_ref(),
            payload,
            &self.default_model,
        ));

        match outcome {
            Ok(response) => match serde_json::to_string(&response) {
                Ok(body) => (200, body),
                Err(e) => (500, error_body(None, e.to_string())),
            },
            Err(RelayError::Provider(message)) => {
                error!("Adapter call failed: {}", message);
                (502, error_body(Some(ErrorKind::Provider), message))
            }
            Err(e) => {
                error!("Invocation failed: {}", e);
                (500, error_body(None, e.to_string()))
            }
        }
    }
}

fn error_body(kind: Option<ErrorKind>, error: String) -> String {
    let body = ErrorBody { error, kind };
    serde_json::to_string(&body).unwrap_or_else(|_| r#"{"error":"internal error"}"#.to_string())
}

fn respond(request: Request, status: u16, body: String) {
    let mut response = Response::from_string(body).with_status_code(status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response = response.with_header(header);
    }
    if let Err(e) = request.respond(response) {
        warn!("Failed to send response: {}", e);
    }
}
