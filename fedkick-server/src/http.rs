//! Routing of HTTP requests.
use crate::{
    store::{self, BlobStore},
    Aggregator, ModelService, ServerConfig, ServiceError, StatsService, UpdateService,
};
use hyper::{
    header::{HeaderValue, CONTENT_TYPE},
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::{convert::Infallible, future::Future, net::SocketAddr, sync::Arc};

/// Request handlers sharing one store.
#[derive(Clone)]
pub struct App {
    models: ModelService,
    updates: UpdateService,
    stats: StatsService,
    aggregator: Aggregator,
}

impl App {
    /// Creates the handlers on the store selected by the configuration.
    pub fn build(config: &ServerConfig) -> anyhow::Result<Self> {
        let store = store::build(&config.store)?;
        Ok(Self::new(store, config))
    }

    /// Creates the handlers on `store`.
    pub fn new(store: Arc<dyn BlobStore>, config: &ServerConfig) -> Self {
        let models = ModelService::new(store.clone(), config.roster.clone(), config.model.clone());
        let stats = StatsService::new(store.clone(), config.roster.clone());
        let updates = UpdateService::new(store.clone(), models.clone(), stats.clone());
        let aggregator = Aggregator::new(store, models.clone(), config.aggregator.clone());
        Self {
            models,
            updates,
            stats,
            aggregator,
        }
    }

    /// The aggregator.
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Handles one request.
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let res = self.route(req).await;
        match res {
            Ok(resp) => {
                debug!("{} {} -> {}", method, path, resp.status());
                resp
            }
            Err(e) => {
                let status = e.status();
                if status.is_server_error() {
                    warn!("{} {} -> {}: {}", method, path, status, e);
                } else {
                    debug!("{} {} -> {}: {}", method, path, status, e);
                }
                error_response(&e)
            }
        }
    }

    async fn route(&self, req: Request<Body>) -> Result<Response<Body>, ServiceError> {
        let path = req.uri().path().trim_end_matches('/').to_string();
        match path.as_str() {
            "/model" => {
                let who = query_param(req.uri().query(), "who").unwrap_or_default();
                let model = self.models.get_or_create(&who).await?;
                json_response(StatusCode::OK, &model)
            }
            "/update" => {
                if req.method() != Method::POST {
                    return Err(ServiceError::MethodNotAllowed);
                }
                let body = hyper::body::to_bytes(req.into_body())
                    .await
                    .map_err(|e| ServiceError::BadRequest(format!("invalid body: {}", e)))?;
                let ack = self.updates.submit(&body).await?;
                json_response(StatusCode::OK, &ack)
            }
            "/stats" => {
                if req.method() != Method::GET {
                    return Err(ServiceError::MethodNotAllowed);
                }
                json_response(StatusCode::OK, &self.stats.read().await)
            }
            "/aggregate" => {
                self.aggregator.aggregate_all().await;
                Ok(Response::new(Body::from("ok")))
            }
            _ => Err(ServiceError::NotFound),
        }
    }
}

/// Binds the server to `addr`.
///
/// Returns the bound address, which differs from `addr` when port 0 was
/// requested, and the future serving requests until `shutdown` resolves.
pub fn bind(
    app: App,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<(SocketAddr, impl Future<Output = Result<(), hyper::Error>> + Send)> {
    let app = Arc::new(app);
    let make_svc = make_service_fn(move |_conn| {
        let app = app.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let app = app.clone();
                async move { Ok::<_, Infallible>(app.handle(req).await) }
            }))
        }
    });
    let server = Server::try_bind(&addr)?.serve(make_svc);
    let local_addr = server.local_addr();
    info!("Listening on http://{}", local_addr);
    Ok((local_addr, server.with_graceful_shutdown(shutdown)))
}

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?
        .split('&')
        .filter_map(|kv| kv.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| decode_component(v))
}

/// Decodes `+` and `%XX` escapes of a query value. Malformed escapes are kept
/// as written.
fn decode_component(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(b) => {
                        out.push(b);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, ServiceError> {
    let text = serde_json::to_string(value)?;
    let mut resp = Response::new(Body::from(text));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(resp)
}

fn error_response(e: &ServiceError) -> Response<Body> {
    let status = e.status();
    match e {
        ServiceError::NotFound | ServiceError::MethodNotAllowed => {
            let mut resp = Response::new(Body::from(e.to_string()));
            *resp.status_mut() = status;
            resp
        }
        _ => {
            let body = serde_json::json!({ "error": e.to_string() });
            let mut resp = Response::new(Body::from(body.to_string()));
            *resp.status_mut() = status;
            resp.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            resp
        }
    }
}
