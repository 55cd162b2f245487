use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
  Open,
}

impl std::fmt::Display for Event {
  fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      Event::Open => write!(formatter, "open"),
    }
  }
}

enum Handler {
  Once(Option<Box<dyn FnOnce(&Event) + Send>>),
  Many(Box<dyn FnMut(&Event) + Send>),
}

impl Handler {
  fn call(&mut self, event: &Event) {
    match self {
      Handler::Once(inner) => {
        if let Some(handler) = inner.take() {
          handler(event);
        }
      }
      Handler::Many(handler) => handler(event),
    }
  }
}

struct Listener {
  event: Event,
  once: bool,
  handler: Arc<Mutex<Handler>>,
}

#[derive(Default)]
pub struct Emitter {
  listeners: Mutex<Vec<Listener>>,
}

impl Emitter {
  fn push(&self, event: Event, handler: Handler) {
    let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
    listeners.push(Listener {
      event,
      once: matches!(handler, Handler::Once(_)),
      handler: Arc::new(Mutex::new(handler)),
    });
  }

  pub fn on<F>(&self, event: Event, handler: F)
  where
    F: FnMut(&Event) + Send + 'static,
  {
    self.push(event, Handler::Many(Box::new(handler)));
  }

  pub fn once<F>(&self, event: Event, handler: F)
  where
    F: FnOnce(&Event) + Send + 'static,
  {
    self.push(event, Handler::Once(Some(Box::new(handler))));
  }

  pub fn listeners(&self, event: Event) -> usize {
    let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
    listeners.iter().filter(|listener| listener.event == event).count()
  }

  // Handlers run after the list lock is released so they can register more listeners.
  pub fn emit(&self, event: Event) -> usize {
    let handlers = {
      let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
      let matching = listeners
        .iter()
        .filter(|listener| listener.event == event)
        .map(|listener| listener.handler.clone())
        .collect::<Vec<Arc<Mutex<Handler>>>>();

      listeners.retain(|listener| listener.event != event || !listener.once);

      matching
    };

    log::trace!("emitting '{}' to {} listener(s)", event, handlers.len());

    for handler in handlers.iter() {
      handler.lock().unwrap_or_else(PoisonError::into_inner).call(&event);
    }

    handlers.len()
  }
}
