use bytes::Bytes;

use crate::error::ProxyError;
use crate::proxy_service::proxy_request_context::{InboundRequest, RequestContextBuilder};
use crate::proxy_service::transport::ProxyTransport;
use crate::route_config::{ConfigStore, ConfigurationResolver};

pub mod path_resolver;
pub mod placeholder;
pub mod proxy_request_context;
pub mod transport;

/// Resolves a route key into a [`ProxyRequestContext`] and hands it to the transport.
///
/// [`ProxyRequestContext`]: proxy_request_context::ProxyRequestContext
pub struct RestProxyService<S, T> {
  resolver: ConfigurationResolver<S>,
  transport: T,
}

impl<S: ConfigStore, T: ProxyTransport> RestProxyService<S, T> {
  pub fn new(store: S, transport: T) -> Self {
    Self {
      resolver: ConfigurationResolver::new(store),
      transport,
    }
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  /// Nothing reaches the transport unless the whole context resolved. The transport output is
  /// returned as-is.
  pub async fn proxy_request(&self, route_key: &str, inbound: &InboundRequest, body: Bytes) -> Result<T::Output, ProxyError> {
    let context = RequestContextBuilder::new(&self.resolver).build(route_key, inbound)?;
    Ok(self.transport.execute(context, body).await)
  }
}
