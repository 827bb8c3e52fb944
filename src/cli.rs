use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::LevelFilter;

use crate::proxy_service::transport::TransportConfig;

/// Forwards `/{route_key}/...` requests to the destination configured for that key.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
  #[arg(long, env = "HTTP_BIND", default_value = "0.0.0.0")]
  pub bind: String,

  #[arg(long, env = "HTTP_PORT", default_value_t = 8080)]
  pub port: u16,

  #[arg(long, env = "HTTP_WORKER_COUNT", default_value_t = 4)]
  pub worker_count: usize,

  /// Route configuration file (yaml).
  #[arg(long, env = "ROUTE_CONF_LOCATION", default_value = "config.yaml")]
  pub config_file: PathBuf,

  /// Environment variables starting with this prefix override route properties.
  #[arg(long, env = "ROUTE_ENV_PREFIX", default_value = "REST_PROXY__")]
  pub env_prefix: String,

  /// Inbound headers exposed to `{placeholder}` header templates.
  #[arg(long, env = "REQUEST_ATTRIBUTE_HEADERS", value_delimiter = ',')]
  pub attribute_headers: Vec<String>,

  #[arg(long, env = "HTTP_PROXY_URL")]
  pub proxy_url: Option<String>,

  #[arg(long, env = "HTTP_PROXY_USER")]
  pub proxy_user: Option<String>,

  #[arg(long, env = "HTTP_PROXY_PASS")]
  pub proxy_pass: Option<String>,

  #[arg(long, env = "HTTP_PROXY_COOKIES")]
  pub proxy_cookies: bool,

  /// Outbound request timeout in seconds.
  #[arg(long, env = "HTTP_TIMEOUT_SECS")]
  pub timeout_secs: Option<u64>,

  #[arg(long, env = "ENABLE_CORS")]
  pub cors: bool,

  #[arg(long, env = "LOG_LEVEL", default_value = "info", value_parser = parse_level)]
  pub log_level: LevelFilter,
}

impl Config {
  pub fn transport_config(&self) -> TransportConfig {
    TransportConfig {
      http_proxy: self.proxy_url.clone(),
      user: self.proxy_user.clone(),
      pass: self.proxy_pass.clone(),
      enable_cookies: self.proxy_cookies,
      timeout: self.timeout_secs.map(Duration::from_secs),
    }
  }

  pub fn attribute_headers(&self) -> Box<[Box<str>]> {
    self.attribute_headers.iter()
      .map(|name| name.trim())
      .filter(|name| !name.is_empty())
      .map(Box::from)
      .collect()
  }
}

fn parse_level(value: &str) -> Result<LevelFilter, String> {
  value.parse::<LevelFilter>()
    .map_err(|_| format!("unknown log level '{}'", value))
}
