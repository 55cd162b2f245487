use std::io::{Error, ErrorKind, Result};
use std::time::Duration;

use async_std;
use dotenv;
use env_logger;

use friar;

async fn run(settings: friar::env::Settings) -> Result<()> {
  let manager = friar::connect(settings.url.as_str(), Some(settings.options))?;
  log::info!("{} created, waiting for open", manager);

  async_std::future::timeout(
    Duration::from_secs(friar::constants::OPEN_WAIT_SECONDS),
    manager.opened(),
  )
  .await
  .map_err(|error| {
    log::warn!("connection did not open in time - {}", error);
    Error::new(ErrorKind::TimedOut, "open-timeout")
  })??;

  log::info!("connection open since {:?}", manager.opened_at());

  let database = manager
    .db()
    .ok_or_else(|| Error::new(ErrorKind::NotConnected, "missing-database"))?;

  let names = database
    .list_collection_names(None)
    .await
    .map_err(friar::errors::mongo_error)?;

  log::info!("database '{}' has {} collection(s)", database.name(), names.len());

  for name in names.iter() {
    println!("{}", name);
  }

  manager.shutdown().await
}

fn main() -> Result<()> {
  if let Err(error) = dotenv::dotenv() {
    println!("unable to load environment - {:?}", error);
  }

  env_logger::init();

  let settings = friar::env::from_env().ok_or_else(|| {
    log::warn!("unable to find '{}' in environment", friar::constants::MONGO_DB_ENV_URL);
    Error::new(ErrorKind::Other, "missing-mongo-config")
  })?;

  async_std::task::block_on(run(settings))
}
