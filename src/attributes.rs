use std::collections::HashMap;
use std::sync::Arc;

use actix_web::{HttpMessage, HttpRequest};

/// Named per-request values available to header templates.
pub trait AttributeSource {
  fn attribute(&self, name: &str) -> Option<&str>;
}

impl<T: AttributeSource + ?Sized> AttributeSource for &T {
  fn attribute(&self, name: &str) -> Option<&str> {
    (**self).attribute(name)
  }
}

/// Immutable attribute set for one request.
///
/// Middleware sitting in front of the proxy handler may place a value of this type in the
/// request extensions; the handler picks it up and adds any configured attribute headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestAttributes {
  values: Arc<HashMap<Box<str>, Box<str>>>,
}

impl RequestAttributes {
  pub fn new<'a, I>(values: I) -> Self where I: IntoIterator<Item=(&'a str, &'a str)> {
    let values = values.into_iter()
      .map(|(name, value)| (Box::from(name), Box::from(value)))
      .collect();

    RequestAttributes {
      values: Arc::new(values),
    }
  }

  /// Attributes already attached to `request`, extended with the values of `header_names`.
  ///
  /// An extension attribute wins over a header of the same name. Headers that are absent or
  /// not valid UTF-8 are skipped.
  pub fn from_request(request: &HttpRequest, header_names: &[Box<str>]) -> Self {
    let mut values: HashMap<Box<str>, Box<str>> = HashMap::new();

    for name in header_names {
      if let Some(value) = request.headers().get(name.as_ref()).and_then(|v| v.to_str().ok()) {
        values.insert(name.clone(), Box::from(value));
      }
    }

    if let Some(attached) = request.extensions().get::<RequestAttributes>() {
      for (name, value) in attached.values.iter() {
        values.insert(name.clone(), value.clone());
      }
    }

    RequestAttributes {
      values: Arc::new(values),
    }
  }

}

impl AttributeSource for RequestAttributes {
  fn attribute(&self, name: &str) -> Option<&str> {
    self.values.get(name).map(|v| v.as_ref())
  }
}

#[cfg(test)]
impl AttributeSource for HashMap<String, String> {
  fn attribute(&self, name: &str) -> Option<&str> {
    self.get(name).map(String::as_str)
  }
}
