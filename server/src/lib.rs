//! HTTP relay: `POST /copy` and `POST /paste` on top of a [`FilesystemStore`].
//!
//! Must run on a multi-threaded tokio runtime: storage access uses `block_in_place`.

use {
    anyhow::{Context as _, Result},
    http_body_util::{BodyExt, Full},
    hyper::{
        Method, Request, Response, StatusCode,
        body::{self, Bytes},
        header::{CONTENT_TYPE, HeaderValue},
        server::conn::http1,
        service::service_fn,
    },
    hyper_util::{rt::TokioIo, server::graceful::GracefulShutdown},
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    stash_protocol::endpoints::{CopyRequest, PasteRequest, RequestToResponse},
    stash_sdk::storage::FilesystemStore,
    std::{
        convert::Infallible, future::Future, net::SocketAddr, path::PathBuf, pin::pin, sync::Arc,
    },
    tokio::{net::TcpListener, signal},
    tracing::{debug, info, warn},
};

pub mod handler;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub storage_path: PathBuf,
    pub bind_addr: SocketAddr,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "info".into()
}

/// Serves requests until interrupted, then waits for open connections to finish.
#[inline]
pub async fn run(config: Config) -> Result<()> {
    let ctx = handler::Context {
        storage: Arc::new(FilesystemStore::new(config.storage_path)?),
    };

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Listening on: {}", config.bind_addr);

    let graceful = GracefulShutdown::new();
    let mut interrupted = pin!(signal::ctrl_c());
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "new connection");
                    let ctx = ctx.clone();
                    let connection = http1::Builder::new().keep_alive(true).serve_connection(
                        TokioIo::new(stream),
                        service_fn(move |req| handle_request(ctx.clone(), req)),
                    );
                    let connection = graceful.watch(connection);
                    tokio::spawn(async move {
                        if let Err(err) = connection.await {
                            warn!(%err, "error while serving HTTP connection");
                        }
                    });
                }
                Err(err) => warn!(%err, "failed to accept"),
            },
            result = &mut interrupted => {
                result.context("failed to listen for interrupt signal")?;
                info!("Shutting down");
                break;
            }
        }
    }
    graceful.shutdown().await;
    Ok(())
}

async fn handle_request(
    ctx: handler::Context,
    request: Request<body::Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let response = try_handle_request(ctx, request)
        .await
        .unwrap_or_else(|code| {
            let mut response = Response::new(Full::new(Bytes::from(code.as_str().to_owned())));
            *response.status_mut() = code;
            response
        });
    debug!(%method, %path, status = %response.status(), "request handled");
    Ok(response)
}

async fn try_handle_request(
    ctx: handler::Context,
    request: Request<body::Incoming>,
) -> Result<Response<Full<Bytes>>, StatusCode> {
    let Some(path) = request.uri().path().strip_prefix('/') else {
        return Err(StatusCode::NOT_FOUND);
    };
    let is_copy = path == CopyRequest::PATH;
    if !is_copy && path != PasteRequest::PATH {
        return Err(StatusCode::NOT_FOUND);
    }
    if request.method() != Method::POST {
        return Err(StatusCode::METHOD_NOT_ALLOWED);
    }
    if is_copy {
        wrap_request(ctx, request, handler::copy).await
    } else {
        wrap_request(ctx, request, handler::paste).await
    }
}

/// Parses a JSON request and reports the handler's outcome in the JSON response.
async fn wrap_request<T, R, F, Fut>(
    ctx: handler::Context,
    request: Request<body::Incoming>,
    f: F,
) -> Result<Response<Full<Bytes>>, StatusCode>
where
    T: RequestToResponse + DeserializeOwned,
    <T as RequestToResponse>::Response: From<Result<R>> + Serialize,
    F: FnOnce(handler::Context, T) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let request = parse_request::<T>(request).await?;
    let result = f(ctx, request).await;
    if let Err(err) = &result {
        warn!("handler error: {err:#}");
    }
    let body = serde_json::to_vec(&<T as RequestToResponse>::Response::from(result))
        .map_err(|err| {
            warn!(%err, "failed to serialize response");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    let mut response = Response::new(Full::new(Bytes::from(body)));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

async fn parse_request<T: DeserializeOwned>(
    request: Request<body::Incoming>,
) -> Result<T, StatusCode> {
    let bytes = request
        .into_body()
        .collect()
        .await
        .map_err(|err| {
            warn!(%err, "failed to read request body");
            StatusCode::BAD_REQUEST
        })?
        .to_bytes();
    serde_json::from_slice(&bytes).map_err(|err| {
        warn!(%err, "failed to deserialize request body");
        StatusCode::BAD_REQUEST
    })
}
