pub mod bootstrap;
pub mod interceptor;
pub mod local_store;
pub mod server;
pub mod share;

pub use local_store::{InMemoryStore, LocalStore, StoreEntry};
pub use server::StorageNode;
pub use share::ShareService;
