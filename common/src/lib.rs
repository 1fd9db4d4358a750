pub mod config;
pub mod crc16;
pub mod error;
pub mod identity;
pub mod slot;
pub mod thread_pool;

pub use config::{Addresses, Config};
pub use error::{ClusterError, ClusterErrorKind};
pub use identity::Identity;
pub use slot::{slot_for_key, NodeDescriptor, Slot, SlotRange, SlotTable, SLOT_COUNT};

pub type ClusterResult<T> = Result<T, ClusterError>;
