//! Data store: raw collections, computed bindings, schemas, state cells and
//! persistence forwarding.

pub mod data;
pub mod persist;
pub mod schema;

pub use data::{DataStore, STATE_SIGNAL_PREFIX};
pub use persist::{
    DurableRecord, DurableStore, EphemeralStore, MemoryDurableStore, MemoryEphemeralStore,
    PersistTarget,
};
pub use schema::Schema;
