use std::io::{ErrorKind, Result};
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Condition;
use actix_web::{web, App, HttpServer};
use clap::Parser;
use log::{info, warn};

use rest_proxy::cli::Config;
use rest_proxy::proxy_service::transport::ReqwestTransport;
use rest_proxy::proxy_service::RestProxyService;
use rest_proxy::route_config::PropertyStore;
use rest_proxy::server::{self, AppState};
use rest_proxy::std_logger;

#[actix_web::main]
async fn main() -> Result<()> {
  let config = Config::parse();

  std_logger::init(config.log_level)
    .map_err(|err| std::io::Error::new(ErrorKind::Other, err.to_string()))?;

  let store = PropertyStore::load_from_file(&config.config_file)?
    .merge_env(&config.env_prefix, std::env::vars_os());

  if store.is_empty() {
    warn!("No route properties found in '{}'.", config.config_file.display());
  } else {
    info!("Loaded {} route properties.", store.len());
  }

  for route_key in store.route_keys() {
    info!("Route '/{}' configured.", route_key);
  }

  let http_client = config.transport_config()
    .to_client()
    .map_err(|err| std::io::Error::new(ErrorKind::Other, err))?;

  let state = web::Data::new(AppState {
    proxy: RestProxyService::new(Arc::new(store), ReqwestTransport::new(http_client)),
    attribute_headers: config.attribute_headers(),
  });

  let enable_cors = config.cors;
  info!("Listening on {}:{} with {} workers.", &config.bind, config.port, config.worker_count);

  HttpServer::new(move || {
    App::new()
      .wrap(Condition::new(enable_cors, Cors::permissive()))
      .app_data(state.clone())
      .configure(server::configure::<Arc<PropertyStore>, ReqwestTransport>)
  })
    .workers(config.worker_count)
    .bind((config.bind.as_str(), config.port))?
    .run()
    .await
}
