#![cfg_attr(not(feature = "std"), no_std)]

// `alloc` backs the catalog's `Vec<Entry>`, storage cells, and the
// Emergency FIFO/bitmap buffers.
extern crate alloc;

// --- Foundation modules ---
pub mod log;
pub mod error;
pub mod lock;
pub mod types;

// --- Object Dictionary runtime ---
pub mod od;

// --- Emergency subsystem ---
pub mod emcy;

// --- Top-level exports ---
pub use emcy::{ConditionFlag, EmergencyConfig, EmergencyManager};
pub use error::{sdo_abort_code, OdAccess, OdError};
pub use lock::{EmcyLock, NoOpLock, OdLock};
pub use od::entry::{AccessAttr, Entry, OdExtension};
pub use od::ObjectDictionary;
pub use types::{NodeId, ValidNodeId};
