use crate::state::NodeView;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Serve this node's view of the network for inspection:
/// `GET /peers` (peer list) and `GET /` (full view).
pub fn spawn_http_server(view: Arc<RwLock<NodeView>>, port: u16) {
    tokio::spawn(async move {
        async fn handle(
            req: Request<Body>,
            view: Arc<RwLock<NodeView>>,
        ) -> Result<Response<Body>, hyper::Error> {
            let body = match (req.method(), req.uri().path()) {
                (&hyper::Method::GET, "/peers") => {
                    let v = view.read().await;
                    serde_json::to_string(&v.peers)
                }
                (&hyper::Method::GET, "/") => {
                    let v = view.read().await;
                    serde_json::to_string(&*v)
                }
                _ => return Ok(status_response(StatusCode::NOT_FOUND, "not found")),
            };

            Ok(match body {
                Ok(json) => {
                    let mut response = Response::new(Body::from(json));
                    response.headers_mut().insert(
                        hyper::header::CONTENT_TYPE,
                        hyper::header::HeaderValue::from_static("application/json"),
                    );
                    response
                }
                Err(e) => {
                    log::error!("failed to encode view: {}", e);
                    status_response(StatusCode::INTERNAL_SERVER_ERROR, "encoding error")
                }
            })
        }

        let make_svc = make_service_fn(move |_| {
            let view = view.clone();
            async move { Ok::<_, hyper::Error>(service_fn(move |req| handle(req, view.clone()))) }
        });

        let addr = ([0, 0, 0, 0], port).into();
        let server = match Server::try_bind(&addr) {
            Ok(builder) => builder.serve(make_svc),
            Err(e) => {
                log::error!("HTTP server could not bind {}: {}", addr, e);
                return;
            }
        };
        log::info!("HTTP server running on http://{}", addr);
        if let Err(e) = server.await {
            log::error!("HTTP server error: {}", e);
        }
    });
}

fn status_response(status: StatusCode, text: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(text));
    *response.status_mut() = status;
    response
}
