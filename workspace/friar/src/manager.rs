use std::collections::HashMap;
use std::io::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_std::channel::{Receiver, Sender};

use crate::collection::Collection;
use crate::db::{self, Driver};
use crate::errors::Violation;
use crate::events::{Emitter, Event};
use crate::oid::{self, Ident, ObjectId};
use crate::topology::{Config, Options, Uri};

pub type OnOpen = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, PartialEq)]
pub enum State {
  Opening,
  Open(chrono::DateTime<chrono::Utc>),
  Closed,
}

pub(crate) struct Inner {
  pub(crate) driver: Arc<dyn Driver>,
  config: Config,
  state: Mutex<State>,
  events: Emitter,
  waiters: Mutex<Vec<Sender<()>>>,
  collections: Mutex<HashMap<String, Arc<Collection>>>,
}

impl Inner {
  fn state(&self) -> MutexGuard<State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn waiters(&self) -> MutexGuard<Vec<Sender<()>>> {
    self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
  }

  // Callers must hold the state lock so a waiter can't slip in after the open or close drained.
  fn wait(&self) -> Receiver<()> {
    let (sender, receiver) = async_std::channel::bounded::<()>(1);
    let mut waiters = self.waiters();
    waiters.retain(|waiter| !waiter.is_closed());
    waiters.push(sender);
    receiver
  }

  fn opened(&self) {
    {
      let mut state = self.state();

      match state.clone() {
        State::Opening => *state = State::Open(chrono::Utc::now()),
        State::Open(at) => {
          log::warn!("connection already opened at {}, ignoring", at);
          return;
        }
        State::Closed => {
          log::debug!("connection closed before open completed, not notifying");
          return;
        }
      }
    }

    let waiters = std::mem::take(&mut *self.waiters());
    for waiter in waiters.iter() {
      if let Err(error) = waiter.try_send(()) {
        log::trace!("open waiter went away - {}", error);
      }
    }

    let count = self.events.emit(Event::Open);
    log::info!("connection open ({}), notified {} listener(s)", self.config.topology, count);
  }

  fn closed(&self) {
    let mut state = self.state();
    log::debug!("closing connection ({:?})", *state);
    *state = State::Closed;

    // Dropping the senders wakes anyone parked in `opened` with an error.
    let waiters = std::mem::take(&mut *self.waiters());
    log::debug!("releasing {} open waiter(s)", waiters.len());
  }
}

#[derive(Clone)]
pub struct Manager {
  inner: Arc<Inner>,
}

impl Manager {
  pub fn new<U>(uri: U, options: Option<Options>) -> Result<Self>
  where
    U: Into<Uri>,
  {
    let config = Config::resolve(uri, options)?;
    let driver = db::MongoDriver::new(config.clone());
    Ok(Self::with_driver(driver, config, None))
  }

  pub fn with_callback<U, F>(uri: U, options: Option<Options>, on_open: F) -> Result<Self>
  where
    U: Into<Uri>,
    F: FnOnce() + Send + 'static,
  {
    let config = Config::resolve(uri, options)?;
    let driver = db::MongoDriver::new(config.clone());
    let on_open: OnOpen = Box::new(on_open);
    Ok(Self::with_driver(driver, config, Some(on_open)))
  }

  pub fn with_driver<D>(driver: D, config: Config, on_open: Option<OnOpen>) -> Self
  where
    D: Driver + 'static,
  {
    let inner = Arc::new(Inner {
      driver: Arc::new(driver),
      config,
      state: Mutex::new(State::Opening),
      events: Emitter::default(),
      waiters: Mutex::new(Vec::new()),
      collections: Mutex::new(HashMap::new()),
    });

    if let Some(callback) = on_open {
      inner.events.once(Event::Open, move |_| callback());
    }

    let driver = inner.driver.clone();
    let manager = Arc::downgrade(&inner);

    async_std::task::spawn(async move {
      if let Err(error) = driver.open().await {
        log::warn!("unable to open connection - {}", error);
        return;
      }

      match manager.upgrade() {
        Some(inner) => inner.opened(),
        None => log::debug!("manager dropped before the connection opened"),
      }
    });

    Manager { inner }
  }

  pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
    Manager { inner }
  }

  pub fn config(&self) -> &Config {
    &self.inner.config
  }

  pub fn database(&self) -> Option<&str> {
    self.inner.config.database.as_deref()
  }

  pub fn db(&self) -> Option<db::Database> {
    self.inner.driver.database()
  }

  pub fn state(&self) -> State {
    self.inner.state().clone()
  }

  pub fn opened_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
    match self.state() {
      State::Open(at) => Some(at),
      _ => None,
    }
  }

  pub fn on<F>(&self, event: Event, handler: F) -> &Self
  where
    F: FnMut(&Event) + Send + 'static,
  {
    self.inner.events.on(event, handler);
    self
  }

  pub fn once<F>(&self, event: Event, handler: F) -> &Self
  where
    F: FnOnce(&Event) + Send + 'static,
  {
    self.inner.events.once(event, handler);
    self
  }

  // A connection that fails to open never resolves this; callers wrap it in a timeout.
  pub async fn opened(&self) -> Result<()> {
    let receiver = {
      let state = self.inner.state();

      match *state {
        State::Open(_) => return Ok(()),
        State::Closed => return Err(Violation::Closed.into()),
        State::Opening => self.inner.wait(),
      }
    };

    receiver.recv().await.map_err(|_| Error::from(Violation::Closed))
  }

  pub fn close_with<F>(&self, callback: F) -> &Self
  where
    F: FnOnce(Result<()>) + Send + 'static,
  {
    self.inner.closed();
    let driver = self.inner.driver.clone();

    async_std::task::spawn(async move {
      callback(driver.close().await);
    });

    self
  }

  pub fn close(&self) -> &Self {
    self.close_with(|result| {
      if let Err(error) = result {
        log::warn!("unable to close connection - {}", error);
      }
    })
  }

  pub async fn shutdown(&self) -> Result<()> {
    self.inner.closed();
    self.inner.driver.close().await
  }

  pub fn get<N>(&self, name: N) -> Arc<Collection>
  where
    N: AsRef<str>,
  {
    let name = name.as_ref();
    let mut collections = self.inner.collections.lock().unwrap_or_else(PoisonError::into_inner);

    collections
      .entry(name.to_string())
      .or_insert_with(|| {
        log::debug!("creating collection handle '{}'", name);
        Arc::new(Collection::new(Arc::downgrade(&self.inner), name))
      })
      .clone()
  }

  pub fn col<N>(&self, name: N) -> Arc<Collection>
  where
    N: AsRef<str>,
  {
    self.get(name)
  }

  pub fn collections(&self) -> Vec<String> {
    let collections = self.inner.collections.lock().unwrap_or_else(PoisonError::into_inner);
    let mut names = collections.keys().cloned().collect::<Vec<String>>();
    names.sort();
    names
  }

  pub fn id<I>(&self, input: I) -> Result<ObjectId>
  where
    I: Into<Ident>,
  {
    oid::id(input)
  }

  pub fn oid<I>(&self, input: I) -> Result<ObjectId>
  where
    I: Into<Ident>,
  {
    oid::id(input)
  }
}

impl std::fmt::Debug for Manager {
  fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(formatter, "Manager({}, {:?})", self.inner.config.topology, self.state())
  }
}

impl std::fmt::Display for Manager {
  fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(formatter, "friar-manager@{}", self.inner.config.topology)
  }
}

pub fn connect<U>(uri: U, options: Option<Options>) -> Result<Manager>
where
  U: Into<Uri>,
{
  Manager::new(uri, options)
}

#[cfg(test)]
mod test {
  use super::{connect, Manager, State};
  use crate::db::Driver;
  use crate::errors::{violation, Violation};
  use crate::events::Event;
  use crate::topology::{Config, Topology};
  use async_std::channel::{bounded, Receiver, Sender};
  use async_trait::async_trait;
  use std::io::{Error, ErrorKind, Result};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};
  use std::time::Duration;

  struct Scripted {
    gate: Receiver<Result<()>>,
    closes: Arc<AtomicUsize>,
  }

  #[async_trait]
  impl Driver for Scripted {
    async fn open(&self) -> Result<()> {
      self
        .gate
        .recv()
        .await
        .unwrap_or_else(|_| Err(Error::new(ErrorKind::Other, "gate dropped")))
    }

    async fn close(&self) -> Result<()> {
      self.closes.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }
  }

  fn scripted(on_open: Option<super::OnOpen>) -> (Manager, Sender<Result<()>>, Arc<AtomicUsize>) {
    let (gate, receiver) = bounded(1);
    let closes = Arc::new(AtomicUsize::new(0));
    let driver = Scripted {
      gate: receiver,
      closes: closes.clone(),
    };
    let config = Config::resolve("localhost/friar", None).unwrap();
    (Manager::with_driver(driver, config, on_open), gate, closes)
  }

  fn wait<T>(receiver: &Receiver<T>) -> Option<T> {
    async_std::task::block_on(async_std::future::timeout(Duration::from_millis(250), receiver.recv()))
      .ok()
      .and_then(|result| result.ok())
  }

  #[test]
  fn missing_uri_never_builds() {
    let error = Manager::new("", None).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidInput);
    assert_eq!(violation(&error), Some(&Violation::MissingUri));

    assert!(connect(Vec::<String>::new(), None).is_err());
    assert!(Manager::with_callback("", None, || ()).is_err());
  }

  #[test]
  fn factory_normalizes_uri() {
    let manager = connect("localhost/mydb", None).unwrap();
    assert_eq!(
      manager.config().topology,
      Topology::Direct("mongodb://localhost/mydb".to_string())
    );
    assert_eq!(manager.state(), State::Opening);
    manager.close();
  }

  #[test]
  fn replica_set_database_is_derived() {
    let manager = Manager::new("host1/db,host2/db", None).unwrap();
    assert_eq!(manager.database(), Some("db"));
    assert!(manager.config().options.safe);
    manager.close();
  }

  #[test]
  fn open_fires_exactly_once() {
    let (sender, receiver) = bounded::<()>(4);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let on_open: super::OnOpen = Box::new(move || {
      counter.fetch_add(1, Ordering::SeqCst);
      let _ = sender.try_send(());
    });

    let (manager, gate, _) = scripted(Some(on_open));
    assert_eq!(manager.state(), State::Opening);
    assert!(manager.opened_at().is_none());

    async_std::task::block_on(gate.send(Ok(()))).unwrap();
    assert_eq!(wait(&receiver), Some(()));

    manager.inner.opened();
    assert_eq!(wait(&receiver), None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(manager.opened_at().is_some());
  }

  #[test]
  fn listeners_run_in_registration_order() {
    let (manager, gate, _) = scripted(None);
    let order = Arc::new(Mutex::new(Vec::new()));
    let (sender, receiver) = bounded::<()>(1);

    let first = order.clone();
    let second = order.clone();
    manager
      .once(Event::Open, move |_| first.lock().unwrap().push("first"))
      .on(Event::Open, move |_| {
        second.lock().unwrap().push("second");
        let _ = sender.try_send(());
      });

    async_std::task::block_on(gate.send(Ok(()))).unwrap();
    assert_eq!(wait(&receiver), Some(()));
    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
  }

  #[test]
  fn opened_resolves() {
    let (manager, gate, _) = scripted(None);

    let result = async_std::task::block_on(async {
      let waiting = manager.opened();
      gate.send(Ok(())).await.unwrap();
      waiting.await
    });

    assert!(result.is_ok());
    assert!(async_std::task::block_on(manager.opened()).is_ok());
  }

  #[test]
  fn failed_open_never_notifies() {
    let (manager, gate, _) = scripted(None);
    let (sender, receiver) = bounded::<()>(1);
    manager.once(Event::Open, move |_| {
      let _ = sender.try_send(());
    });

    async_std::task::block_on(gate.send(Err(Error::new(ErrorKind::Other, "refused")))).unwrap();
    assert_eq!(wait(&receiver), None);
    assert_eq!(manager.state(), State::Opening);

    let waited = async_std::task::block_on(async_std::future::timeout(
      Duration::from_millis(100),
      manager.opened(),
    ));
    assert!(waited.is_err());
  }

  #[test]
  fn close_chains_and_forwards_callback() {
    let (manager, _gate, closes) = scripted(None);
    let (sender, receiver) = bounded::<bool>(1);

    let chained = manager.close_with(move |result| {
      let _ = sender.try_send(result.is_ok());
    });

    assert!(std::ptr::eq(chained, &manager));
    assert_eq!(wait(&receiver), Some(true));
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(manager.state(), State::Closed);

    let error = async_std::task::block_on(manager.opened()).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotConnected);
  }

  #[test]
  fn close_releases_parked_waiters() {
    let (manager, _gate, _) = scripted(None);
    let waiter = manager.clone();
    let waiting = async_std::task::spawn(async move { waiter.opened().await });

    async_std::task::block_on(async_std::task::sleep(Duration::from_millis(50)));
    manager.close();

    let result = async_std::task::block_on(async_std::future::timeout(Duration::from_millis(500), waiting))
      .expect("parked waiter should be released by close");
    let error = result.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotConnected);
    assert_eq!(violation(&error), Some(&Violation::Closed));
    assert_eq!(manager.inner.waiters().len(), 0);
  }

  #[test]
  fn abandoned_waiters_are_pruned() {
    let (manager, gate, _) = scripted(None);

    for _ in 0..3 {
      let waited = async_std::task::block_on(async_std::future::timeout(
        Duration::from_millis(20),
        manager.opened(),
      ));
      assert!(waited.is_err());
    }

    assert_eq!(manager.inner.waiters().len(), 1);
    assert_eq!(manager.inner.events.listeners(Event::Open), 0);

    let result = async_std::task::block_on(async {
      let waiting = manager.opened();
      gate.send(Ok(())).await.unwrap();
      waiting.await
    });
    assert!(result.is_ok());
    assert!(manager.opened_at().is_some());
  }

  #[test]
  fn close_before_open_suppresses_event() {
    let (manager, gate, closes) = scripted(None);
    let (sender, receiver) = bounded::<()>(1);
    manager.once(Event::Open, move |_| {
      let _ = sender.try_send(());
    });

    async_std::task::block_on(manager.shutdown()).unwrap();
    async_std::task::block_on(gate.send(Ok(()))).unwrap();

    assert_eq!(wait(&receiver), None);
    assert_eq!(manager.state(), State::Closed);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn get_is_memoized() {
    let (manager, _gate, _) = scripted(None);
    let first = manager.get("orders");
    let second = manager.get("orders");
    let alias = manager.col(String::from("orders"));

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &alias));
    assert_eq!(first.name(), "orders");

    let other = manager.get("users");
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(manager.collections(), vec!["orders".to_string(), "users".to_string()]);
  }

  #[test]
  fn clones_share_the_registry() {
    let (manager, _gate, _) = scripted(None);
    let clone = manager.clone();
    assert!(Arc::ptr_eq(&manager.get("orders"), &clone.get("orders")));
  }

  #[test]
  fn id_and_oid_agree() {
    let (manager, _gate, _) = scripted(None);
    let hex = "507f1f77bcf86cd799439011";
    assert_eq!(manager.id(hex).unwrap(), manager.oid(hex).unwrap());
    assert_ne!(manager.id(None::<&str>).unwrap(), manager.oid(None::<&str>).unwrap());

    let error = manager.oid("zzz").unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidInput);
  }
}
