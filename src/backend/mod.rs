pub mod memory;
pub mod rest;
pub mod traits;
pub mod types;

pub use memory::MemoryBackend;
pub use rest::RestBackend;
pub use traits::{Backend, ObjectStorage, RemoteStore, SessionAuth};
pub use types::{Direction, Order, Session, Upload};
