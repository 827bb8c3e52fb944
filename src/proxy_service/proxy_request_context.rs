use log::debug;

use crate::attributes::{AttributeSource, RequestAttributes};
use crate::error::ProxyError;
use crate::proxy_service::path_resolver::resolve_uri;
use crate::proxy_service::placeholder::{expand, parse_header_list};
use crate::route_config::{ConfigStore, ConfigurationResolver, Credentials};

/// What the routing layer knows about the request being forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
  pub method: Box<str>,
  /// Path matched by the routing layer. `None` when no mapping metadata is available.
  pub path_within_mapping: Option<Box<str>>,
  pub attributes: RequestAttributes,
}

impl InboundRequest {
  pub fn new(method: &str) -> Self {
    InboundRequest {
      method: Box::from(method),
      path_within_mapping: None,
      attributes: RequestAttributes::default(),
    }
  }

  pub fn set_path(mut self, path: &str) -> Self {
    self.path_within_mapping = Some(Box::from(path));
    self
  }

  pub fn set_attributes(mut self, attributes: RequestAttributes) -> Self {
    self.attributes = attributes;
    self
  }
}

/// Fully resolved outbound request. Built once by [`RequestContextBuilder`] and read-only after.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyRequestContext {
  route_key: Box<str>,
  uri: Box<str>,
  credentials: Option<Credentials>,
  headers: Vec<(Box<str>, Box<str>)>,
  method: Box<str>,
}

impl ProxyRequestContext {
  pub fn route_key(&self) -> &str {
    &self.route_key
  }

  pub fn uri(&self) -> &str {
    &self.uri
  }

  pub fn username(&self) -> Option<&str> {
    self.credentials.as_ref().map(|c| c.username.as_ref())
  }

  pub fn password(&self) -> Option<&str> {
    self.credentials.as_ref().map(|c| c.password.as_ref())
  }

  pub fn credentials(&self) -> Option<&Credentials> {
    self.credentials.as_ref()
  }

  /// Configured headers in declaration order.
  pub fn headers(&self) -> &[(Box<str>, Box<str>)] {
    &self.headers
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self.headers.iter()
      .find(|(key, _)| key.eq_ignore_ascii_case(name))
      .map(|(_, value)| value.as_ref())
  }

  pub fn method(&self) -> &str {
    &self.method
  }
}

impl std::fmt::Debug for ProxyRequestContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ProxyRequestContext")
      .field("route_key", &self.route_key)
      .field("uri", &self.uri)
      .field("username", &self.username())
      .field("password", &self.password().map(|_| "***"))
      .field("headers", &self.headers)
      .field("method", &self.method)
      .finish()
  }
}

pub struct RequestContextBuilder<'a, S> {
  resolver: &'a ConfigurationResolver<S>,
}

impl<'a, S: ConfigStore> RequestContextBuilder<'a, S> {
  pub fn new(resolver: &'a ConfigurationResolver<S>) -> Self {
    Self { resolver }
  }

  pub fn build(&self, route_key: &str, inbound: &InboundRequest) -> Result<ProxyRequestContext, ProxyError> {
    let config = self.resolver.resolve(route_key)?;
    let uri = resolve_uri(route_key, &config.base_uri, inbound.path_within_mapping.as_deref());
    let headers = match config.proxy_headers.as_deref() {
      Some(raw) => expand_headers(raw, &inbound.attributes)?,
      None => Vec::new(),
    };

    let context = ProxyRequestContext {
      route_key: Box::from(route_key),
      uri: Box::from(uri.as_str()),
      credentials: config.credentials,
      headers,
      method: inbound.method.clone(),
    };

    debug!("Resolved '{}' to {} {}", route_key, context.method(), context.uri());
    Ok(context)
  }
}

fn expand_headers<A: AttributeSource>(raw: &str, attributes: &A) -> Result<Vec<(Box<str>, Box<str>)>, ProxyError> {
  let mut headers: Vec<(Box<str>, Box<str>)> = Vec::new();

  for template in parse_header_list(raw)? {
    let value: Box<str> = Box::from(expand(&template.template, attributes)?.as_str());

    match headers.iter_mut().find(|(name, _)| name.eq_ignore_ascii_case(&template.name)) {
      Some(existing) => existing.1 = value,
      None => headers.push((template.name, value)),
    }
  }

  Ok(headers)
}

#[cfg(test)]
mod tests {
  use crate::route_config::PropertyStore;

  use super::*;

  fn resolver(properties: &[(&str, &str)]) -> ConfigurationResolver<PropertyStore> {
    ConfigurationResolver::new(PropertyStore::new(properties.iter().copied()))
  }

  fn pairs(values: &[(&str, &str)]) -> Vec<(Box<str>, Box<str>)> {
    values.iter().map(|(name, value)| (Box::from(*name), Box::from(*value))).collect()
  }

  #[test]
  fn control_request_strips_route_key() {
    let resolver = resolver(&[("control.uri", "http://destination")]);
    let inbound = InboundRequest::new("GET").set_path("/control/foo");

    let context = RequestContextBuilder::new(&resolver).build("control", &inbound).unwrap();

    assert_eq!(context.route_key(), "control");
    assert_eq!(context.uri(), "http://destination/foo");
    assert_eq!(context.method(), "GET");
    assert!(context.headers().is_empty());
    assert_eq!(context.username(), None);
  }

  #[test]
  fn credentials_are_attached() {
    let resolver = resolver(&[
      ("withCredentials.uri", "http://localhost/foo"),
      ("withCredentials.username", "user"),
      ("withCredentials.password", "pass"),
    ]);

    let context = RequestContextBuilder::new(&resolver)
      .build("withCredentials", &InboundRequest::new("GET"))
      .unwrap();

    assert_eq!(context.uri(), "http://localhost/foo");
    assert_eq!(context.username(), Some("user"));
    assert_eq!(context.password(), Some("pass"));
  }

  #[test]
  fn static_header_is_attached() {
    let resolver = resolver(&[
      ("withAdditionalHeaders.uri", "http://localhost/foo"),
      ("withAdditionalHeaders.proxyHeaders", "Some-Header: staticvalue"),
    ]);
    let inbound = InboundRequest::new("GET")
      .set_attributes(RequestAttributes::new([("wiscedupvi", "UW111A111")]));

    let context = RequestContextBuilder::new(&resolver).build("withAdditionalHeaders", &inbound).unwrap();

    assert_eq!(context.headers(), pairs(&[("Some-Header", "staticvalue")]).as_slice());
  }

  #[test]
  fn placeholder_header_uses_request_attribute() {
    let resolver = resolver(&[
      ("withAdditionalHeaders2.uri", "http://localhost/foo"),
      ("withAdditionalHeaders2.proxyHeaders", "On-Behalf-Of: {wiscedupvi}"),
    ]);
    let inbound = InboundRequest::new("GET")
      .set_attributes(RequestAttributes::new([("wiscedupvi", "UW111A111")]));

    let context = RequestContextBuilder::new(&resolver).build("withAdditionalHeaders2", &inbound).unwrap();

    assert_eq!(context.header("on-behalf-of"), Some("UW111A111"));
  }

  #[test]
  fn missing_placeholder_attribute_fails_build() {
    let resolver = resolver(&[
      ("k.uri", "http://localhost/foo"),
      ("k.proxyHeaders", "On-Behalf-Of: {wiscedupvi}"),
    ]);

    let err = RequestContextBuilder::new(&resolver)
      .build("k", &InboundRequest::new("GET"))
      .unwrap_err();

    assert_eq!(err, ProxyError::UnresolvedPlaceholder { attribute: "wiscedupvi".into() });
  }

  #[test]
  fn additional_path_is_appended() {
    let resolver = resolver(&[("withAdditionalPath.uri", "http://localhost/foo")]);
    let inbound = InboundRequest::new("GET").set_path("api/v2/employee/123");

    let context = RequestContextBuilder::new(&resolver).build("withAdditionalPath", &inbound).unwrap();

    assert_eq!(context.uri(), "http://localhost/foo/api/v2/employee/123");
  }

  #[test]
  fn missing_route_fails_before_headers_are_parsed() {
    let resolver = resolver(&[("other.proxyHeaders", "broken")]);

    let err = RequestContextBuilder::new(&resolver)
      .build("other", &InboundRequest::new("GET"))
      .unwrap_err();

    assert!(matches!(err, ProxyError::MissingConfiguration { .. }));
  }

  #[test]
  fn repeated_builds_are_equal_including_header_order() {
    let resolver = resolver(&[
      ("k.uri", "http://localhost"),
      ("k.proxyHeaders", "Z-Last: z\nA-First: {id}\nM-Middle: m"),
    ]);
    let inbound = InboundRequest::new("POST")
      .set_path("/k/items/1")
      .set_attributes(RequestAttributes::new([("id", "42")]));
    let builder = RequestContextBuilder::new(&resolver);

    let first = builder.build("k", &inbound).unwrap();
    let second = builder.build("k", &inbound).unwrap();

    assert_eq!(first, second);
    let names: Vec<&str> = first.headers().iter().map(|(n, _)| n.as_ref()).collect();
    assert_eq!(names, vec!["Z-Last", "A-First", "M-Middle"]);
  }

  #[test]
  fn duplicate_header_keeps_first_position_last_value() {
    let resolver = resolver(&[
      ("k.uri", "http://localhost"),
      ("k.proxyHeaders", "X-One: a\nX-Two: b\nx-one: c"),
    ]);

    let context = RequestContextBuilder::new(&resolver)
      .build("k", &InboundRequest::new("GET"))
      .unwrap();

    assert_eq!(context.headers(), pairs(&[("X-One", "c"), ("X-Two", "b")]).as_slice());
  }

  #[test]
  fn debug_output_hides_password() {
    let resolver = resolver(&[("k.uri", "http://x"), ("k.username", "user"), ("k.password", "secret")]);
    let context = RequestContextBuilder::new(&resolver).build("k", &InboundRequest::new("GET")).unwrap();

    let rendered = format!("{:?}", context);
    assert!(rendered.contains("user"));
    assert!(!rendered.contains("secret"));
  }
}
