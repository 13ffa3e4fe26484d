pub mod cached;
pub mod durable;
pub mod memory;
pub mod traits;

pub use cached::{CachedStore, CachedStoreConfig};
pub use durable::DurableStore;
pub use memory::{MemoryBackingStore, MemoryStore};
pub use traits::{BackingStore, StateStore};
