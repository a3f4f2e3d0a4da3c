pub mod error;
pub mod model;
pub mod session_store;
pub mod store;

pub use error::StorageError;
pub use model::{InvalidRole, Role, Session, User};
pub use session_store::SessionStore;
pub use store::KeyValueStore;
