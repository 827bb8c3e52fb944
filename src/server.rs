use actix_web::{web, HttpRequest, Responder};
use log::warn;

use crate::attributes::RequestAttributes;
use crate::error::ProxyError;
use crate::proxy_service::proxy_request_context::InboundRequest;
use crate::proxy_service::transport::ProxyTransport;
use crate::proxy_service::RestProxyService;
use crate::route_config::ConfigStore;

pub struct AppState<S, T> {
  pub proxy: RestProxyService<S, T>,
  /// Inbound headers copied into request attributes.
  pub attribute_headers: Box<[Box<str>]>,
}

/// Registers `/{route_key}` and `/{route_key}/{tail}` for every method.
pub fn configure<S, T>(cfg: &mut web::ServiceConfig)
where
  S: ConfigStore + 'static,
  T: ProxyTransport + 'static,
  T::Output: Responder + 'static,
{
  cfg
    .route("/{route_key}", web::to(forward::<S, T>))
    .route("/{route_key}/{tail:.*}", web::to(forward::<S, T>));
}

async fn forward<S, T>(
  request: HttpRequest,
  body: web::Bytes,
  state: web::Data<AppState<S, T>>,
) -> Result<T::Output, ProxyError>
where
  S: ConfigStore + 'static,
  T: ProxyTransport + 'static,
{
  let route_key = raw_route_key(request.path());
  let inbound = inbound_request(&request, &state.attribute_headers);

  state.proxy
    .proxy_request(route_key, &inbound, body)
    .await
    .map_err(|err| {
      warn!("{} {} rejected: {}", request.method(), request.path(), err);
      err
    })
}

/// First segment of the undecoded path, so the key always matches what gets stripped.
fn raw_route_key(path: &str) -> &str {
  let path = path.strip_prefix('/').unwrap_or(path);
  path.split('/').next().unwrap_or_default()
}

fn inbound_request(request: &HttpRequest, attribute_headers: &[Box<str>]) -> InboundRequest {
  InboundRequest::new(request.method().as_str())
    .set_path(request.path())
    .set_attributes(RequestAttributes::from_request(request, attribute_headers))
}
