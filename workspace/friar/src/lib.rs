mod collection;
mod manager;

pub mod constants;
pub mod db;
pub mod env;
pub mod errors;
pub mod events;
pub mod oid;
pub mod topology;

pub use collection::Collection;
pub use events::Event;
pub use manager::{connect, Manager, OnOpen, State};
pub use oid::{id, ObjectId};
pub use topology::{Config, Options, Uri};
