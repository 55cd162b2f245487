use std::io::{Error, ErrorKind};

#[derive(Debug, PartialEq)]
pub enum Violation {
  MissingUri,
  InvalidIdentifier(String),
  InvalidServer(String),
  Unavailable(String),
  Closed,
}

impl std::fmt::Display for Violation {
  fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      Violation::MissingUri => write!(formatter, "No connection URI provided."),
      Violation::InvalidIdentifier(input) => write!(formatter, "invalid object id '{}'", input),
      Violation::InvalidServer(input) => write!(formatter, "invalid server address '{}'", input),
      Violation::Unavailable(name) => write!(formatter, "collection '{}' used before the connection opened", name),
      Violation::Closed => write!(formatter, "connection closed"),
    }
  }
}

impl std::error::Error for Violation {}

impl Violation {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Violation::Closed | Violation::Unavailable(_) => ErrorKind::NotConnected,
      _ => ErrorKind::InvalidInput,
    }
  }
}

impl From<Violation> for Error {
  fn from(violation: Violation) -> Error {
    Error::new(violation.kind(), violation)
  }
}

pub fn mongo_error(error: mongodb::error::Error) -> Error {
  Error::new(ErrorKind::Other, format!("{}", error))
}

pub fn violation(error: &Error) -> Option<&Violation> {
  error.get_ref().and_then(|inner| inner.downcast_ref::<Violation>())
}
