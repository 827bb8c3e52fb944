use std::time::Duration;

use actix_web::HttpResponse;
use bytes::Bytes;
use log::{debug, error};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Response};

use crate::error::TransportError;
use crate::proxy_service::proxy_request_context::ProxyRequestContext;

/// Executes a resolved [`ProxyRequestContext`] against its destination.
#[allow(async_fn_in_trait)]
pub trait ProxyTransport {
  type Output;

  async fn execute(&self, context: ProxyRequestContext, body: Bytes) -> Self::Output;
}

pub struct TransportConfig {
  pub http_proxy: Option<String>,
  pub user: Option<String>,
  pub pass: Option<String>,
  pub enable_cookies: bool,
  pub timeout: Option<Duration>,
}

impl TransportConfig {
  pub fn to_client(self) -> Result<Client, TransportError> {
    let TransportConfig {
      http_proxy,
      user,
      pass,
      enable_cookies,
      timeout,
    } = self;
    let mut client_builder = reqwest::ClientBuilder::new();

    if let Some(proxy_url) = http_proxy {
      let mut proxy = reqwest::Proxy::all(proxy_url).map_err(TransportError::Client)?;

      if let (Some(user_name), Some(password)) = (user, pass) {
        proxy = proxy.basic_auth(&user_name, &password);
      }

      client_builder = client_builder.proxy(proxy);
    }

    if enable_cookies {
      client_builder = client_builder.cookie_store(true);
    }

    if let Some(timeout) = timeout {
      client_builder = client_builder.timeout(timeout);
    }

    client_builder
      .redirect(Policy::limited(5))
      .build()
      .map_err(TransportError::Client)
  }
}

#[derive(Clone)]
pub struct ReqwestTransport {
  http_client: Client,
}

impl ReqwestTransport {
  pub fn new(http_client: Client) -> Self {
    Self { http_client }
  }

  fn init_request(&self, context: &ProxyRequestContext, body: Bytes) -> Result<reqwest::RequestBuilder, TransportError> {
    let method = Method::from_bytes(context.method().as_bytes())
      .map_err(|_| TransportError::InvalidRequest(format!("unsupported method '{}'", context.method())))?;

    let mut builder = self.http_client.request(method, context.uri());

    if let Some(credentials) = context.credentials() {
      builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
    }

    if !context.headers().is_empty() {
      builder = builder.headers(header_map(context)?);
    }

    if !body.is_empty() {
      builder = builder.body(body);
    }

    Ok(builder)
  }

  /// Copies status and every upstream header, `Set-Cookie` attributes included.
  fn map_response_head(response: &Response) -> HttpResponse {
    let mut http_response = HttpResponse::new(response.status());
    let headers = http_response.headers_mut();

    for (name, value) in response.headers() {
      headers.append(name.clone(), value.clone());
    }

    http_response
  }
}

fn header_map(context: &ProxyRequestContext) -> Result<HeaderMap, TransportError> {
  let mut header_map = HeaderMap::with_capacity(context.headers().len());

  for (name, value) in context.headers() {
    let name = HeaderName::try_from(name.as_ref())
      .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
    let value = HeaderValue::try_from(value.as_ref())
      .map_err(|e| TransportError::InvalidRequest(format!("header '{}': {}", name, e)))?;

    header_map.insert(name, value);
  }

  Ok(header_map)
}

impl ProxyTransport for ReqwestTransport {
  type Output = Result<HttpResponse, TransportError>;

  async fn execute(&self, context: ProxyRequestContext, body: Bytes) -> Self::Output {
    let builder = self.init_request(&context, body)?;
    let proxy_response = builder.send().await;

    debug!("Proxy response for '{}' {:?}", context.route_key(), &proxy_response);

    match proxy_response {
      Ok(data) => {
        let mut response = ReqwestTransport::map_response_head(&data);

        match data.bytes().await {
          Ok(bytes) => {
            response = response.set_body(actix_web::body::BoxBody::new(bytes));
            Ok(response)
          }
          Err(err) => {
            error!("Reading proxy body failed {}", err);
            Err(TransportError::Body(err))
          }
        }
      }
      Err(err) => {
        error!("Proxy request to '{}' failed {}", context.uri(), err);
        Err(TransportError::Send(err))
      }
    }
  }
}
