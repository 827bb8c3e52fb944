//! Destination URI composition.
//!
//! No percent-decoding or `..` sanitization happens here; whatever the routing layer matched is
//! appended as-is.

/// Joins the residual of `inbound_path` (after the `/<route_key>` segment) onto `base_uri`.
///
/// A missing `inbound_path` leaves `base_uri` unchanged.
pub fn resolve_uri(route_key: &str, base_uri: &str, inbound_path: Option<&str>) -> String {
  let residual = inbound_path
    .map(|path| strip_route_key(route_key, path))
    .unwrap_or_default();

  join(base_uri, residual)
}

/// Removes a leading `/<route_key>` segment and the single `/` after it.
///
/// Only a whole segment matches, so `/controller/x` keeps its path for route key `control`.
pub fn strip_route_key<'a>(route_key: &str, path: &'a str) -> &'a str {
  let rest = path
    .strip_prefix('/')
    .and_then(|p| p.strip_prefix(route_key));

  match rest {
    Some("") => "",
    Some(rest) => rest.strip_prefix('/').unwrap_or(path),
    None => path,
  }
}

fn join(base_uri: &str, residual: &str) -> String {
  let residual = residual.trim_start_matches('/');
  if residual.is_empty() {
    return base_uri.to_string();
  }

  format!("{}/{}", base_uri.trim_end_matches('/'), residual)
}
