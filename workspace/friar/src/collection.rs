use std::io::{Error, Result};
use std::sync::{Arc, Weak};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::{bson, doc};
use crate::errors::{mongo_error, Violation};
use crate::manager::{Inner, Manager};
use crate::oid::{self, Ident};

pub struct Collection {
  manager: Weak<Inner>,
  name: String,
}

impl Collection {
  pub(crate) fn new(manager: Weak<Inner>, name: &str) -> Self {
    Collection {
      manager,
      name: name.to_string(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn manager(&self) -> Option<Manager> {
    self.manager.upgrade().map(Manager::from_inner)
  }

  // None until the connection is open.
  pub fn driver<T>(&self) -> Option<mongodb::Collection<T>>
  where
    T: Send + Sync,
  {
    let inner: Arc<Inner> = self.manager.upgrade()?;
    inner.driver.database().map(|database| database.collection::<T>(&self.name))
  }

  fn require<T>(&self) -> Result<mongodb::Collection<T>>
  where
    T: Send + Sync,
  {
    self
      .driver()
      .ok_or_else(|| Error::from(Violation::Unavailable(self.name.clone())))
  }

  pub async fn find_by_id<T, I>(&self, id: I) -> Result<Option<T>>
  where
    T: DeserializeOwned + Unpin + Send + Sync,
    I: Into<Ident>,
  {
    let id = oid::id(id)?;
    let collection = self.require::<T>()?;
    log::trace!("finding '{}' in '{}'", id, self.name);
    collection.find_one(doc! { "_id": id }, None).await.map_err(mongo_error)
  }

  pub async fn insert<T>(&self, document: &T) -> Result<bson::Bson>
  where
    T: Serialize + Send + Sync,
  {
    let collection = self.require::<T>()?;
    let result = collection.insert_one(document, None).await.map_err(mongo_error)?;
    log::debug!("inserted {} into '{}'", result.inserted_id, self.name);
    Ok(result.inserted_id)
  }
}

impl std::fmt::Debug for Collection {
  fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(formatter, "Collection({})", self.name)
  }
}
