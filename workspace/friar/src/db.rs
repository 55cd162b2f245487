use std::io::Result;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use mongodb;

pub use mongodb::bson;
pub use mongodb::bson::doc;
pub use mongodb::options::{Acknowledgment, ClientOptions, ServerAddress, WriteConcern};
pub use mongodb::{Client, Database};

use crate::constants;
use crate::errors::mongo_error;
use crate::topology::{Config, Topology};

#[async_trait]
pub trait Driver: Send + Sync {
  async fn open(&self) -> Result<()>;

  async fn close(&self) -> Result<()>;

  fn database(&self) -> Option<Database> {
    None
  }
}

pub struct MongoDriver {
  config: Config,
  connection: RwLock<Option<(Client, String)>>,
}

impl MongoDriver {
  pub fn new(config: Config) -> Self {
    MongoDriver {
      config,
      connection: RwLock::new(None),
    }
  }

  pub async fn options(&self) -> Result<ClientOptions> {
    let mut options = match &self.config.topology {
      Topology::Direct(uri) => ClientOptions::parse(uri).await.map_err(mongo_error)?,
      Topology::ReplicaSet(servers) => {
        let hosts = servers
          .iter()
          .map(|server| ServerAddress::parse(server.to_string()).map_err(mongo_error))
          .collect::<Result<Vec<ServerAddress>>>()?;

        ClientOptions::builder().hosts(hosts).build()
      }
    };

    let app_name = self
      .config
      .options
      .app_name
      .clone()
      .unwrap_or(constants::MONGO_DB_APP_NAME.to_string());

    options.app_name = Some(app_name);
    options.write_concern = Some(WriteConcern::builder().w(Acknowledgment::Nodes(1)).build());

    if let Some(name) = &self.config.options.replica_set {
      options.repl_set_name = Some(name.clone());
    }

    if let Some(millis) = self.config.options.connect_timeout_ms {
      options.connect_timeout = Some(Duration::from_millis(millis));
    }

    if let Some(database) = &self.config.database {
      options.default_database = Some(database.clone());
    }

    Ok(options)
  }
}

#[async_trait]
impl Driver for MongoDriver {
  async fn open(&self) -> Result<()> {
    let options = self.options().await?;
    let name = options
      .default_database
      .clone()
      .unwrap_or(constants::MONGO_DB_DEFAULT_DATABASE.to_string());

    log::debug!("opening {} against database '{}'", self.config.topology, name);

    let client = Client::with_options(options).map_err(mongo_error)?;
    let pong = client
      .database(&name)
      .run_command(doc! { "ping": 1 }, None)
      .await
      .map_err(mongo_error)?;

    log::debug!("ping response - {:?}", pong);

    *self.connection.write().unwrap_or_else(PoisonError::into_inner) = Some((client, name));
    Ok(())
  }

  async fn close(&self) -> Result<()> {
    let connection = self.connection.write().unwrap_or_else(PoisonError::into_inner).take();

    match connection {
      Some((client, name)) => {
        log::debug!("shutting down client for '{}'", name);
        client.shutdown().await;
      }
      None => log::debug!("close requested without an open client"),
    }

    Ok(())
  }

  fn database(&self) -> Option<Database> {
    let connection = self.connection.read().unwrap_or_else(PoisonError::into_inner);
    connection.as_ref().map(|(client, name)| client.database(name))
  }
}
