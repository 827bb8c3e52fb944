//! `proxyHeaders` parsing and `{attribute}` substitution.
//!
//! The configuration value holds one `Name: template` entry per line. Blank lines are skipped.

use std::str::FromStr;

use reqwest::header::HeaderName;

use crate::attributes::AttributeSource;
use crate::error::ProxyError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderTemplate {
  pub name: Box<str>,
  pub template: Box<str>,
}

pub fn parse_header_list(raw_proxy_headers: &str) -> Result<Vec<HeaderTemplate>, ProxyError> {
  raw_proxy_headers
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .map(parse_entry)
    .collect()
}

fn parse_entry(entry: &str) -> Result<HeaderTemplate, ProxyError> {
  let malformed = || ProxyError::MalformedHeaderList { entry: entry.to_string() };

  let (name, template) = entry.split_once(':').ok_or_else(malformed)?;
  let name = name.trim();

  if HeaderName::from_str(name).is_err() {
    return Err(malformed());
  }

  Ok(HeaderTemplate {
    name: Box::from(name),
    template: Box::from(template.trim()),
  })
}

/// Replaces every `{name}` in `template` with the attribute of that name.
///
/// Text without a closing brace, and `{}`, is copied unchanged. A name never contains `{`: in
/// `{a{b}` only `{b}` is a placeholder and `{a` stays literal.
pub fn expand<A: AttributeSource>(template: &str, attributes: &A) -> Result<String, ProxyError> {
  let mut output = String::with_capacity(template.len());
  let mut rest = template;

  while let Some(open) = rest.find('{') {
    let (literal, tail) = rest.split_at(open);
    output.push_str(literal);

    match tail[1..].find('}') {
      Some(0) => {
        output.push_str("{}");
        rest = &tail[2..];
      }
      Some(close) if tail[1..=close].contains('{') => {
        let nested = tail[1..=close].rfind('{').map_or(0, |i| i + 1);
        output.push_str(&tail[..nested]);
        rest = &tail[nested..];
      }
      Some(close) => {
        let name = &tail[1..=close];
        let value = attributes.attribute(name)
          .ok_or_else(|| ProxyError::UnresolvedPlaceholder { attribute: name.to_string() })?;

        output.push_str(value);
        rest = &tail[close + 2..];
      }
      None => {
        output.push_str(tail);
        rest = "";
      }
    }
  }

  output.push_str(rest);
  Ok(output)
}
