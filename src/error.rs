use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

/// Failures raised while turning an inbound request into a [`ProxyRequestContext`].
///
/// [`ProxyRequestContext`]: crate::proxy_service::proxy_request_context::ProxyRequestContext
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ProxyError {
  /// No `<route_key>.uri` property is configured.
  #[error("no uri configured for route '{route_key}'")]
  MissingConfiguration { route_key: String },

  /// Only one of `<route_key>.username` and `<route_key>.password` is configured.
  #[error("route '{route_key}' configures only one of username/password")]
  InconsistentCredentials { route_key: String },

  /// A header template references an attribute the request does not carry.
  #[error("header template references missing request attribute '{attribute}'")]
  UnresolvedPlaceholder { attribute: String },

  #[error("malformed proxyHeaders entry '{entry}'")]
  MalformedHeaderList { entry: String },
}

impl ResponseError for ProxyError {
  fn status_code(&self) -> StatusCode {
    match self {
      ProxyError::MissingConfiguration { .. } => StatusCode::NOT_FOUND,
      ProxyError::InconsistentCredentials { .. }
      | ProxyError::UnresolvedPlaceholder { .. }
      | ProxyError::MalformedHeaderList { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    HttpResponse::build(self.status_code()).body(self.to_string())
  }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
  #[error("unable to read route configuration: {0}")]
  Io(#[from] std::io::Error),

  #[error("invalid route configuration yaml: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("unsupported value at '{key}': {reason}")]
  UnsupportedValue { key: String, reason: &'static str },
}

impl From<ConfigLoadError> for std::io::Error {
  fn from(err: ConfigLoadError) -> Self {
    match err {
      ConfigLoadError::Io(io) => io,
      other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
    }
  }
}

/// Outbound call failed. Mapped to `502 Bad Gateway`.
#[derive(Debug, Error)]
pub enum TransportError {
  #[error("unable to build http client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("invalid outbound request: {0}")]
  InvalidRequest(String),

  #[error("proxy request failed: {0}")]
  Send(#[source] reqwest::Error),

  #[error("reading proxy body failed: {0}")]
  Body(#[source] reqwest::Error),
}

impl ResponseError for TransportError {
  fn status_code(&self) -> StatusCode {
    StatusCode::BAD_GATEWAY
  }

  fn error_response(&self) -> HttpResponse {
    HttpResponse::build(self.status_code()).body("")
  }
}
