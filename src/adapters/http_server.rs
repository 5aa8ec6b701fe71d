//! HTTP server adapter (TCP/80).
//!
//! Implements [`HttpServerPort`] on `tiny_http`, which runs over
//! `std::net` on both ESP-IDF (lwIP) and the host.  The listener accepts
//! and parses on its own thread, but requests are only *handled* from
//! [`poll`](HttpServerPort::poll) on the main task, one per call, so every
//! handler shares the scheduler's single-threaded state.

use log::{debug, info, warn};
use tiny_http::{Header, Response, Server};

use crate::app::http::{HttpReply, HttpRequest, Method, PostAction};
use crate::app::ports::{HttpHandler, HttpServerPort};
use crate::error::ServerError;

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

pub struct TinyHttpServer {
    server: Option<Server>,
    served: u32,
}

impl TinyHttpServer {
    pub fn new() -> Self {
        Self {
            server: None,
            served: 0,
        }
    }

    /// Port actually bound (differs from the request when 0 was asked for).
    pub fn local_port(&self) -> Option<u16> {
        self.server
            .as_ref()
            .and_then(|s| s.server_addr().to_ip())
            .map(|a| a.port())
    }

    /// Requests served since start.
    pub fn served(&self) -> u32 {
        self.served
    }

    fn respond(request: tiny_http::Request, reply: &HttpReply) {
        let mut response =
            Response::from_string(reply.body.as_str()).with_status_code(reply.status);
        if let Some(h) = header("Content-Type", reply.content_type) {
            response = response.with_header(h);
        }
        if reply.close {
            if let Some(h) = header("Connection", "close") {
                response = response.with_header(h);
            }
        }
        if let Err(e) = request.respond(response) {
            warn!("HTTP: failed to send response: {}", e);
        }
    }
}

impl Default for TinyHttpServer {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpServerPort for TinyHttpServer {
    fn start(&mut self, port: u16) -> Result<(), ServerError> {
        let addr = format!("0.0.0.0:{}", port);
        let server = Server::http(&addr).map_err(|e| {
            warn!("HTTP: bind {} failed: {}", addr, e);
            ServerError::BindFailed(port)
        })?;
        info!("HTTP: listening on {}", addr);
        self.server = Some(server);
        Ok(())
    }

    fn poll(&mut self, handler: &mut dyn HttpHandler) -> Option<PostAction> {
        let server = self.server.as_ref()?;
        let mut request = match server.try_recv() {
            Ok(Some(r)) => r,
            Ok(None) => return None,
            Err(e) => {
                warn!("HTTP: accept error: {}", e);
                return None;
            }
        };

        let target = request.url().to_owned();
        let method = Method::parse(&request.method().to_string());
        let content_type = request
            .headers()
            .iter()
            .find(|h| h.field.equiv("Content-Type"))
            .map(|h| h.value.as_str().to_owned());
        let (path, query) = HttpRequest::split_target(&target);
        debug!("HTTP: {:?} {}", method, path);

        let reply = {
            let mut req = HttpRequest {
                method,
                path,
                query,
                content_type: content_type.as_deref(),
                body: request.as_reader(),
            };
            handler.handle(&mut req)
        };

        Self::respond(request, &reply);
        self.served = self.served.wrapping_add(1);
        reply.after
    }
}
