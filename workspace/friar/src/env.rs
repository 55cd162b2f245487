use crate::constants;
use crate::topology::Options;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
  pub url: String,
  pub options: Options,
}

fn parse_options(raw: &str) -> Options {
  serde_json::from_str::<Options>(raw).unwrap_or_else(|error| {
    log::warn!("ignoring malformed '{}' - {}", constants::MONGO_DB_OPTIONS_ENV, error);
    Options::default()
  })
}

pub fn from_lookup<F>(lookup: F) -> Option<Settings>
where
  F: Fn(&str) -> Option<String>,
{
  let url = lookup(constants::MONGO_DB_ENV_URL).filter(|url| !url.is_empty())?;

  let mut options = lookup(constants::MONGO_DB_OPTIONS_ENV)
    .map(|raw| parse_options(&raw))
    .unwrap_or_default();

  if let Some(database) = lookup(constants::MONGO_DB_DATABASE_ENV) {
    options.database = Some(database);
  }

  if let Some(app_name) = lookup(constants::MONGO_DB_APP_NAME_ENV) {
    options.app_name = Some(app_name);
  }

  if let Some(timeout) = lookup(constants::MONGO_DB_CONNECT_TIMEOUT_ENV) {
    match timeout.parse::<u64>() {
      Ok(millis) => options.connect_timeout_ms = Some(millis),
      Err(error) => log::warn!("invalid connect timeout '{}' - {}", timeout, error),
    }
  }

  Some(Settings { url, options })
}

pub fn from_env() -> Option<Settings> {
  from_lookup(|key| std::env::var(key).ok())
}
