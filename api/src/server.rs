use std::{
    future::Future,
    io,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use futures_util::{SinkExt, StreamExt};
use http::{
    header::{CONNECTION, USER_AGENT},
    HeaderValue, Version,
};
use tokio::{
    net::{TcpListener, TcpStream, ToSocketAddrs},
    sync::{OwnedSemaphorePermit, Semaphore},
};
use tokio_util::codec::{Decoder, Framed};

use crate::{
    config::ServerSettings,
    http::{codec::ConnectionCodec, Request, Response},
};

type Handler<A, F> = fn(Request, A) -> F;

pub struct Server<A, F> {
    state: A,
    handler: Handler<A, F>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
}

impl<S, F> Server<S, F>
where
    S: Clone + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    pub fn new(state: S, handler: Handler<S, F>, settings: &ServerSettings) -> Self {
        Self {
            state,
            handler,
            semaphore: Arc::new(Semaphore::new(settings.max_concurrent_connections)),
            timeout: settings.request_timeout(),
        }
    }

    pub async fn bind<A: ToSocketAddrs>(self, addr: A) -> io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        let server = Arc::new(self);
        let addr = listener.local_addr()?;
        tracing::info!(target: "listener", ?addr, "server is running");

        loop {
            let Ok(permit) = Arc::clone(&server.semaphore).acquire_owned().await else {
                return Ok(());
            };

            let (socket, addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    tracing::warn!(target: "listener", %err, "failed to accept connection");
                    continue;
                }
            };

            let server = Arc::clone(&server);
            tokio::spawn(server.handle_connection(socket, addr, permit));
        }
    }

    #[tracing::instrument(skip(self, socket, _permit))]
    async fn handle_connection(
        self: Arc<Self>,
        socket: TcpStream,
        addr: SocketAddr,
        _permit: OwnedSemaphorePermit,
    ) {
        let mut codec = ConnectionCodec::default().framed(socket);

        // The timeout covers one read/handle/send cycle, so a busy
        // keep-alive connection stays open while an idle one is closed.
        loop {
            match tokio::time::timeout(self.timeout, self.serve_request(&mut codec)).await {
                Ok(true) => continue,
                Ok(false) => return,
                Err(_) => {
                    tracing::debug!("connection timed out");
                    return;
                }
            }
        }
    }

    /// Answers the next request on the connection. Returns whether the
    /// connection should be kept open.
    async fn serve_request(&self, codec: &mut Framed<TcpStream, ConnectionCodec>) -> bool {
        let req = match codec.next().await {
            Some(Ok(req)) => req,
            None => return false,
            Some(Err(err)) => {
                tracing::warn!(%err, "failed to read request");
                return false;
            }
        };

        let keep_alive = wants_keep_alive(&req);
        let version = req.version();
        let user = req
            .headers()
            .get(USER_AGENT)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("Unknown"));
        let method = req.method().clone();
        let path = req.uri().to_string();

        let now = Instant::now();
        let mut resp = (self.handler)(req, self.state.clone()).await;
        tracing::info!(
            target: "requests",
            %method,
            %path,
            status = resp.status().as_u16(),
            elapsed = ?now.elapsed(),
            r#""{method} {path}" by {user:?}"#
        );

        *resp.version_mut() = version;
        match (keep_alive, version) {
            (false, _) => {
                resp.headers_mut()
                    .insert(CONNECTION, HeaderValue::from_static("close"));
            }
            (true, Version::HTTP_10) => {
                resp.headers_mut()
                    .insert(CONNECTION, HeaderValue::from_static("keep-alive"));
            }
            (true, _) => {}
        }

        if let Err(err) = codec.send(resp).await {
            tracing::warn!(%err, "failed to send response");
            return false;
        }

        keep_alive
    }
}

fn wants_keep_alive(req: &Request) -> bool {
    let connection = req
        .headers()
        .get(CONNECTION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_ascii_lowercase);

    match req.version() {
        Version::HTTP_10 => connection.as_deref() == Some("keep-alive"),
        _ => connection.as_deref() != Some("close"),
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::http::IntoResponse;

    async fn echo_path(req: Request, _: ()) -> Response {
        (StatusCode::OK, req.uri().path().to_string()).into_response()
    }

    #[test]
    fn keep_alive_follows_version_defaults() {
        let request = |version, connection: Option<&str>| {
            let mut builder = http::Request::builder().version(version);
            if let Some(connection) = connection {
                builder = builder.header(CONNECTION, connection);
            }
            builder.body(None).unwrap()
        };

        assert!(wants_keep_alive(&request(Version::HTTP_11, None)));
        assert!(!wants_keep_alive(&request(Version::HTTP_11, Some("Close"))));
        assert!(!wants_keep_alive(&request(Version::HTTP_10, None)));
        assert!(wants_keep_alive(&request(Version::HTTP_10, Some("keep-alive"))));
    }

    #[tokio::test]
    async fn serves_requests_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::new((), echo_path, &ServerSettings::default());
        tokio::spawn(server.serve(listener));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /contagem-pessoas HTTP/1.1\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"), "{raw}");
        assert!(raw.contains("connection: close\r\n"));
        assert!(raw.ends_with("/contagem-pessoas"));
    }

    #[tokio::test]
    async fn answers_with_the_request_version() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::new((), echo_path, &ServerSettings::default());
        tokio::spawn(server.serve(listener));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /contagem-pessoas HTTP/1.0\r\n\r\n")
            .await
            .unwrap();

        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.0 200 OK\r\n"), "{raw}");
        assert!(raw.contains("connection: close\r\n"));
    }

    async fn read_response(stream: &mut TcpStream, body: &str) -> String {
        let mut raw = Vec::new();
        let mut buf = [0; 1024];
        while !raw.ends_with(body.as_bytes()) {
            let n = stream.read(&mut buf).await.unwrap();
            assert_ne!(n, 0, "connection closed early");
            raw.extend_from_slice(&buf[..n]);
        }
        String::from_utf8(raw).unwrap()
    }

    #[tokio::test]
    async fn busy_keep_alive_connection_outlives_the_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let settings = ServerSettings {
            request_timeout_secs: 1,
            ..ServerSettings::default()
        };
        tokio::spawn(Server::new((), echo_path, &settings).serve(listener));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        for _ in 0..6 {
            stream
                .write_all(b"GET /contagem-pessoas HTTP/1.1\r\n\r\n")
                .await
                .unwrap();
            let raw = read_response(&mut stream, "/contagem-pessoas").await;
            assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"), "{raw}");

            tokio::time::sleep(Duration::from_millis(300)).await;
        }

        // left idle, the connection is closed once the timeout passes
        let mut buf = [0; 64];
        let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .expect("idle connection was not closed");
        assert_eq!(read.unwrap(), 0);
    }
}
