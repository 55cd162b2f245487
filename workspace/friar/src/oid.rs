use std::io::{Error, Result};

pub use bson::oid::ObjectId;

use crate::errors::Violation;

#[derive(Debug, Clone, PartialEq)]
pub enum Ident {
  Fresh,
  Hex(String),
  Typed(ObjectId),
}

impl From<&str> for Ident {
  fn from(input: &str) -> Self {
    Ident::Hex(input.to_string())
  }
}

impl From<String> for Ident {
  fn from(input: String) -> Self {
    Ident::Hex(input)
  }
}

impl From<&String> for Ident {
  fn from(input: &String) -> Self {
    Ident::Hex(input.clone())
  }
}

impl From<ObjectId> for Ident {
  fn from(input: ObjectId) -> Self {
    Ident::Typed(input)
  }
}

impl From<&ObjectId> for Ident {
  fn from(input: &ObjectId) -> Self {
    Ident::Typed(*input)
  }
}

impl<T> From<Option<T>> for Ident
where
  T: Into<Ident>,
{
  fn from(input: Option<T>) -> Self {
    input.map(Into::into).unwrap_or(Ident::Fresh)
  }
}

pub fn id<I>(input: I) -> Result<ObjectId>
where
  I: Into<Ident>,
{
  match input.into() {
    Ident::Fresh => Ok(ObjectId::new()),
    Ident::Typed(oid) => Ok(oid),
    Ident::Hex(hex) => ObjectId::parse_str(&hex).map_err(|error| {
      log::debug!("unable to parse object id '{}' - {}", hex, error);
      Error::from(Violation::InvalidIdentifier(hex))
    }),
  }
}
