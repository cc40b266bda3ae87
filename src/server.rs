use crate::agent::ChatAgent;
use crate::websocket::handle_connection;
use std::error::Error;
use std::sync::Arc;
use std::num::NonZeroU32;
use std::net::SocketAddr;
use tokio::net::{ TcpListener, TcpStream };
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ Request, Response };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::http::response::Response as HttpResponse;
use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };

use log::{ info, warn, error, debug };

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> = RateLimiter::direct(Quota::per_second(NonZeroU32::new(10).unwrap()));
}

/// Extracts the client key from the `X-API-Key` header, falling back to an
/// `api_key` query parameter.
fn provided_api_key(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    if from_header.is_some() {
        return from_header;
    }

    req.uri()
        .query()?
        .split('&')
        .find_map(|pair| {
            let mut kv = pair.splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some("api_key"), Some(value)) => Some(value.to_string()),
                _ => None,
            }
        })
}

fn unauthorized() -> HttpResponse<Option<String>> {
    let mut resp = HttpResponse::new(Some("Unauthorized".to_string()));
    *resp.status_mut() = StatusCode::UNAUTHORIZED;
    resp
}

pub struct Server {
    addr: String,
    agent: Arc<ChatAgent>,
    api_key: Option<String>,
}

impl Server {
    pub fn new(addr: String, agent: Arc<ChatAgent>, api_key: Option<String>) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty());

        if api_key.is_some() {
            info!("Server configured with API Key authentication.");
        } else {
            warn!("Server configured WITHOUT API Key authentication. Connections are open.");
        }

        Self { addr, agent, api_key }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.addr).await?;
        info!("WS server listening on: {}", self.addr);

        loop {
            let (stream, peer) = listener.accept().await?;

            if CONNECTION_LIMITER.check().is_err() {
                warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
                continue;
            }

            info!("Incoming connection from: {}", peer);
            let agent_clone = Arc::clone(&self.agent);
            let required_api_key = self.api_key.clone();

            tokio::spawn(async move {
                if
                    let Err(e) = Self::process_connection(
                        peer,
                        stream,
                        agent_clone,
                        required_api_key
                    ).await
                {
                    error!("Failed to process connection for {}: {}", peer, e);
                }
            });
        }
    }

    async fn process_connection(
        peer: SocketAddr,
        stream: TcpStream,
        agent: Arc<ChatAgent>,
        required_api_key: Option<String>
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let auth_callback = |
            req: &Request,
            response: Response
        | -> Result<Response, HttpResponse<Option<String>>> {
            info!("Handshake from {}", peer);
            let provided = provided_api_key(req);
            debug!("Client provided API key: {}", provided.is_some());

            if let Some(ref required) = required_api_key {
                if provided.as_deref() != Some(required.as_str()) {
                    warn!("{}: bad or missing API key", peer);
                    return Err(unauthorized());
                }
                info!("{} authenticated", peer);
            }

            Ok(response)
        };

        match accept_hdr_async(stream, auth_callback).await {
            Ok(ws) => {
                handle_connection(peer, ws, agent).await;
                Ok(())
            }
            Err(e) => {
                error!("Handshake failed for {}: {}", peer, e);
                Err(Box::new(e) as _)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, header: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(key) = header {
            builder = builder.header("X-API-Key", key);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn api_key_from_header_wins() {
        let req = request("/ws?api_key=query", Some("header"));
        assert_eq!(provided_api_key(&req).as_deref(), Some("header"));
    }

    #[test]
    fn api_key_from_query() {
        let req = request("/ws?foo=1&api_key=secret", None);
        assert_eq!(provided_api_key(&req).as_deref(), Some("secret"));
    }

    #[test]
    fn no_api_key() {
        assert_eq!(provided_api_key(&request("/ws", None)), None);
        assert_eq!(provided_api_key(&request("/ws?foo=bar", None)), None);
    }
}
