use std::io::Result;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::errors::Violation;

const SRV_SCHEME: &'static str = "mongodb+srv://";

#[derive(Debug, Clone, PartialEq)]
pub enum Uri {
  Single(String),
  List(Vec<String>),
}

impl From<&str> for Uri {
  fn from(input: &str) -> Self {
    Uri::Single(input.to_string())
  }
}

impl From<String> for Uri {
  fn from(input: String) -> Self {
    Uri::Single(input)
  }
}

impl From<&String> for Uri {
  fn from(input: &String) -> Self {
    Uri::Single(input.clone())
  }
}

impl From<Vec<String>> for Uri {
  fn from(input: Vec<String>) -> Self {
    Uri::List(input)
  }
}

impl From<Vec<&str>> for Uri {
  fn from(input: Vec<&str>) -> Self {
    Uri::List(input.into_iter().map(String::from).collect())
  }
}

impl From<&[&str]> for Uri {
  fn from(input: &[&str]) -> Self {
    Uri::List(input.iter().map(|item| item.to_string()).collect())
  }
}

impl Uri {
  fn is_empty(&self) -> bool {
    match self {
      Uri::Single(inner) => inner.trim().is_empty(),
      Uri::List(entries) => entries.iter().all(|entry| entry.trim().is_empty()),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Options {
  #[serde(default)]
  pub database: Option<String>,
  // Ignored on the way in; every manager connects with acknowledged writes.
  #[serde(default)]
  pub safe: bool,
  #[serde(default)]
  pub app_name: Option<String>,
  #[serde(default)]
  pub replica_set: Option<String>,
  #[serde(default)]
  pub connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Server {
  pub host: String,
  pub port: u16,
}

impl std::fmt::Display for Server {
  fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(formatter, "{}:{}", self.host, self.port)
  }
}

impl Server {
  fn parse(entry: &str) -> Result<Self> {
    let address = entry.split('/').next().unwrap_or_default();

    // Bracketed ipv6 literals keep their brackets; only a colon after the closing one is a port.
    let split = if address.starts_with('[') {
      address
        .find(']')
        .map(|close| close + 1)
        .filter(|end| *end == address.len() || address[*end..].starts_with(':'))
        .map(|end| address[end..].find(':').map(|_| end))
        .ok_or_else(|| Violation::InvalidServer(entry.to_string()))?
    } else {
      address.rfind(':')
    };

    let (host, port) = match split {
      Some(index) => {
        let port = address[index + 1..]
          .parse::<u16>()
          .map_err(|_| Violation::InvalidServer(entry.to_string()))?;
        (&address[..index], port)
      }
      None => (address, constants::REPLICA_SET_DEFAULT_PORT),
    };

    if host.is_empty() {
      return Err(Violation::InvalidServer(entry.to_string()).into());
    }

    Ok(Server {
      host: host.to_string(),
      port,
    })
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Topology {
  Direct(String),
  ReplicaSet(Vec<Server>),
}

impl std::fmt::Display for Topology {
  fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      Topology::Direct(uri) => write!(formatter, "direct({})", uri),
      Topology::ReplicaSet(servers) => {
        let hosts = servers.iter().map(|s| s.to_string()).collect::<Vec<String>>();
        write!(formatter, "replset({})", hosts.join(","))
      }
    }
  }
}

// Drops the first run of non-slash characters plus one slash; "host/db" becomes "db", "host" becomes "".
fn strip_leading_segment(entry: &str) -> String {
  let start = match entry.find(|c| c != '/') {
    Some(index) => index,
    None => return entry.to_string(),
  };

  let end = entry[start..]
    .find('/')
    .map(|index| start + index + 1)
    .unwrap_or(entry.len());

  format!("{}{}", &entry[..start], &entry[end..])
}

fn with_scheme(uri: &str) -> String {
  if uri.starts_with(constants::MONGO_DB_SCHEME) || uri.starts_with(SRV_SCHEME) {
    return uri.to_string();
  }

  format!("{}{}", constants::MONGO_DB_SCHEME, uri)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
  pub topology: Topology,
  pub database: Option<String>,
  pub options: Options,
}

impl Config {
  pub fn resolve<U>(uri: U, options: Option<Options>) -> Result<Self>
  where
    U: Into<Uri>,
  {
    let uri = uri.into();

    if uri.is_empty() {
      return Err(Violation::MissingUri.into());
    }

    let mut options = options.unwrap_or_default();
    options.safe = true;

    let entries = match uri {
      Uri::List(entries) => entries,
      Uri::Single(single) if single.contains(',') => single.split(',').map(String::from).collect(),
      Uri::Single(single) => {
        let uri = with_scheme(single.trim());
        log::debug!("direct connection '{}'", uri);

        return Ok(Config {
          database: options.database.clone().filter(|name| !name.is_empty()),
          topology: Topology::Direct(uri),
          options,
        });
      }
    };

    let mut database = options.database.clone().filter(|name| !name.is_empty());
    let mut servers = Vec::with_capacity(entries.len());

    for entry in entries.iter().map(|entry| entry.trim()).filter(|entry| !entry.is_empty()) {
      if database.is_none() {
        database = Some(strip_leading_segment(entry)).filter(|name| !name.is_empty());
      }

      servers.push(Server::parse(entry)?);
    }

    if servers.is_empty() {
      return Err(Violation::MissingUri.into());
    }

    log::debug!("repl set connection {:?} to database {:?}", servers, database);

    options.database = database.clone();

    Ok(Config {
      topology: Topology::ReplicaSet(servers),
      database,
      options,
    })
  }
}
