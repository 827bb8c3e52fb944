use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use log::debug;
use serde_yaml::Value;

use crate::error::{ConfigLoadError, ProxyError};

/// Dotted-key property lookup (`<route_key>.<property>`).
pub trait ConfigStore {
  fn property(&self, key: &str) -> Option<&str>;
}

impl<T: ConfigStore + ?Sized> ConfigStore for Arc<T> {
  fn property(&self, key: &str) -> Option<&str> {
    (**self).property(key)
  }
}

/// In-memory property set, built once at start-up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyStore {
  properties: HashMap<Box<str>, Box<str>>,
}

impl PropertyStore {
  pub fn new<'a, I>(properties: I) -> Self where I: IntoIterator<Item=(&'a str, &'a str)> {
    let properties = properties.into_iter()
      .map(|(key, value)| (Box::from(key), Box::from(value)))
      .collect();

    PropertyStore { properties }
  }

  pub fn load_from_file(path: &Path) -> Result<PropertyStore, ConfigLoadError> {
    let file = File::open(path)?;
    let document: Value = serde_yaml::from_reader(file)?;
    PropertyStore::from_yaml(document)
  }

  pub fn from_yaml_str(source: &str) -> Result<PropertyStore, ConfigLoadError> {
    let document: Value = serde_yaml::from_str(source)?;
    PropertyStore::from_yaml(document)
  }

  fn from_yaml(document: Value) -> Result<PropertyStore, ConfigLoadError> {
    let mut store = PropertyStore::default();
    flatten_into(&mut store.properties, None, document)?;
    Ok(store)
  }

  /// Overrides properties with `<prefix>seg1__seg2...` environment variables.
  ///
  /// Variables whose name or value is not valid UTF-8 are skipped.
  pub fn merge_env<I>(mut self, prefix: &str, vars: I) -> Self where I: IntoIterator<Item=(OsString, OsString)> {
    for (name, value) in vars {
      let (Ok(name), Ok(value)) = (name.into_string(), value.into_string()) else {
        continue;
      };

      if let Some(stripped) = name.strip_prefix(prefix) {
        if stripped.is_empty() {
          continue;
        }

        let key = stripped.split("__").collect::<Vec<_>>().join(".");
        debug!("Property '{}' overridden from environment.", &key);
        self.properties.insert(Box::from(key.as_str()), Box::from(value.as_str()));
      }
    }

    self
  }

  /// Distinct route keys, sorted.
  pub fn route_keys(&self) -> Vec<&str> {
    let mut keys: Vec<&str> = self.properties.keys()
      .filter_map(|key| key.strip_suffix(".uri"))
      .collect();

    keys.sort_unstable();
    keys
  }

  pub fn len(&self) -> usize {
    self.properties.len()
  }

  pub fn is_empty(&self) -> bool {
    self.properties.is_empty()
  }
}

impl ConfigStore for PropertyStore {
  fn property(&self, key: &str) -> Option<&str> {
    self.properties.get(key).map(|v| v.as_ref())
  }
}

fn flatten_into(target: &mut HashMap<Box<str>, Box<str>>, prefix: Option<&str>, value: Value) -> Result<(), ConfigLoadError> {
  let key = || prefix.unwrap_or_default().to_string();

  match value {
    Value::Null => {}
    Value::Mapping(mapping) => {
      for (name, child) in mapping {
        let name = scalar_to_string(&name).ok_or_else(|| ConfigLoadError::UnsupportedValue {
          key: key(),
          reason: "mapping keys must be scalars",
        })?;

        let child_key = match prefix {
          Some(parent) => format!("{}.{}", parent, name),
          None => name,
        };

        flatten_into(target, Some(&child_key), child)?;
      }
    }
    Value::Sequence(items) => {
      let lines = items.iter()
        .map(scalar_to_string)
        .collect::<Option<Vec<String>>>()
        .ok_or_else(|| ConfigLoadError::UnsupportedValue {
          key: key(),
          reason: "sequences may only contain scalars",
        })?;

      insert_scalar(target, prefix, lines.join("\n"))?;
    }
    Value::Tagged(tagged) => flatten_into(target, prefix, tagged.value)?,
    scalar => {
      if let Some(text) = scalar_to_string(&scalar) {
        insert_scalar(target, prefix, text)?;
      }
    }
  }

  Ok(())
}

fn insert_scalar(target: &mut HashMap<Box<str>, Box<str>>, prefix: Option<&str>, text: String) -> Result<(), ConfigLoadError> {
  let key = prefix.ok_or(ConfigLoadError::UnsupportedValue {
    key: String::new(),
    reason: "document root must be a mapping",
  })?;

  target.insert(Box::from(key), Box::from(text.as_str()));
  Ok(())
}

fn scalar_to_string(value: &Value) -> Option<String> {
  match value {
    Value::String(text) => Some(text.clone()),
    Value::Bool(flag) => Some(flag.to_string()),
    Value::Number(number) => Some(number.to_string()),
    _ => None,
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
  pub username: Box<str>,
  pub password: Box<str>,
}

/// Settings of one route key, resolved per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfiguration {
  pub base_uri: Box<str>,
  pub credentials: Option<Credentials>,
  pub proxy_headers: Option<Box<str>>,
}

pub struct ConfigurationResolver<S> {
  store: S,
}

impl<S: ConfigStore> ConfigurationResolver<S> {
  pub fn new(store: S) -> Self {
    Self { store }
  }

  pub fn resolve(&self, route_key: &str) -> Result<RouteConfiguration, ProxyError> {
    let base_uri = self.lookup(route_key, "uri")
      .ok_or_else(|| ProxyError::MissingConfiguration { route_key: route_key.to_string() })?;

    let credentials = match (self.lookup(route_key, "username"), self.lookup(route_key, "password")) {
      (Some(username), Some(password)) => Some(Credentials {
        username: Box::from(username),
        password: Box::from(password),
      }),
      (None, None) => None,
      _ => return Err(ProxyError::InconsistentCredentials { route_key: route_key.to_string() }),
    };

    Ok(RouteConfiguration {
      base_uri: Box::from(base_uri),
      credentials,
      proxy_headers: self.lookup(route_key, "proxyHeaders").map(Box::from),
    })
  }

  #[inline]
  fn lookup(&self, route_key: &str, property: &str) -> Option<&str> {
    self.store
      .property(&format!("{}.{}", route_key, property))
      .filter(|value| !value.trim().is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn resolver(properties: &[(&str, &str)]) -> ConfigurationResolver<PropertyStore> {
    ConfigurationResolver::new(PropertyStore::new(properties.iter().copied()))
  }

  #[test]
  fn resolves_uri_only_route() {
    let config = resolver(&[("control.uri", "http://destination")])
      .resolve("control")
      .unwrap();

    assert_eq!(config, RouteConfiguration {
      base_uri: Box::from("http://destination"),
      credentials: None,
      proxy_headers: None,
    });
  }

  #[test]
  fn missing_uri_names_route_key() {
    let err = resolver(&[("other.uri", "http://destination")])
      .resolve("control")
      .unwrap_err();

    assert_eq!(err, ProxyError::MissingConfiguration { route_key: "control".into() });
  }

  #[test]
  fn blank_uri_counts_as_missing() {
    let err = resolver(&[("control.uri", "   ")]).resolve("control").unwrap_err();
    assert!(matches!(err, ProxyError::MissingConfiguration { .. }));
  }

  #[test]
  fn paired_credentials_are_copied() {
    let config = resolver(&[
      ("withCredentials.uri", "http://localhost/foo"),
      ("withCredentials.username", "user"),
      ("withCredentials.password", "pass"),
    ]).resolve("withCredentials").unwrap();

    assert_eq!(config.credentials, Some(Credentials {
      username: Box::from("user"),
      password: Box::from("pass"),
    }));
  }

  #[test]
  fn half_configured_credentials_fail() {
    let only_user = resolver(&[("a.uri", "http://x"), ("a.username", "user")]).resolve("a");
    let only_pass = resolver(&[("a.uri", "http://x"), ("a.password", "pass")]).resolve("a");

    for result in [only_user, only_pass] {
      assert_eq!(result.unwrap_err(), ProxyError::InconsistentCredentials { route_key: "a".into() });
    }
  }

  #[test]
  fn nested_yaml_flattens_to_dotted_keys() {
    let store = PropertyStore::from_yaml_str(r#"
control:
  uri: http://destination
withAdditionalHeaders2:
  uri: http://localhost/foo
  proxyHeaders: "On-Behalf-Of: {wiscedupvi}"
flat.uri: http://flat
"#).unwrap();

    assert_eq!(store.property("control.uri"), Some("http://destination"));
    assert_eq!(store.property("withAdditionalHeaders2.proxyHeaders"), Some("On-Behalf-Of: {wiscedupvi}"));
    assert_eq!(store.property("flat.uri"), Some("http://flat"));
    assert_eq!(store.route_keys(), vec!["control", "flat", "withAdditionalHeaders2"]);
  }

  #[test]
  fn yaml_sequence_joins_with_newline() {
    let store = PropertyStore::from_yaml_str(r#"
multi:
  uri: http://localhost
  proxyHeaders:
    - "A: one"
    - "B: {two}"
  port: 8080
  enabled: true
  ignored: ~
"#).unwrap();

    assert_eq!(store.property("multi.proxyHeaders"), Some("A: one\nB: {two}"));
    assert_eq!(store.property("multi.port"), Some("8080"));
    assert_eq!(store.property("multi.enabled"), Some("true"));
    assert_eq!(store.property("multi.ignored"), None);
  }

  #[test]
  fn nested_sequences_are_rejected() {
    let err = PropertyStore::from_yaml_str("a:\n  proxyHeaders:\n    - [x, y]\n").unwrap_err();
    assert!(matches!(err, ConfigLoadError::UnsupportedValue { ref key, .. } if key == "a.proxyHeaders"));
  }

  #[test]
  fn scalar_document_is_rejected() {
    let err = PropertyStore::from_yaml_str("just a string").unwrap_err();
    assert!(matches!(err, ConfigLoadError::UnsupportedValue { .. }));
  }

  #[test]
  fn environment_overrides_file_values() {
    let store = PropertyStore::from_yaml_str("control:\n  uri: http://file\n")
      .unwrap()
      .merge_env("REST_PROXY__", vec![
        (OsString::from("REST_PROXY__control__uri"), OsString::from("http://env")),
        (OsString::from("REST_PROXY__control__proxyHeaders"), OsString::from("X-Env: yes")),
        (OsString::from("UNRELATED"), OsString::from("value")),
        (OsString::from("REST_PROXY__"), OsString::from("empty")),
      ]);

    assert_eq!(store.property("control.uri"), Some("http://env"));
    assert_eq!(store.property("control.proxyHeaders"), Some("X-Env: yes"));
    assert_eq!(store.len(), 2);
  }

  #[cfg(unix)]
  #[test]
  fn non_utf8_environment_entries_are_skipped() {
    use std::os::unix::ffi::OsStringExt;

    let store = PropertyStore::default().merge_env("REST_PROXY__", vec![
      (OsString::from_vec(b"REST_PROXY__bad\xff__uri".to_vec()), OsString::from("http://bad")),
      (OsString::from("REST_PROXY__k__uri"), OsString::from_vec(b"http://\xff".to_vec())),
      (OsString::from("REST_PROXY__good__uri"), OsString::from("http://good")),
    ]);

    assert_eq!(store.len(), 1);
    assert_eq!(store.property("good.uri"), Some("http://good"));
  }

  #[test]
  fn empty_document_has_no_properties() {
    let store = PropertyStore::from_yaml_str("{}").unwrap();
    assert!(store.is_empty());
    assert!(store.route_keys().is_empty());
  }
}
