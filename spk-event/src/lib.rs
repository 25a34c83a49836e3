//! Event exchange documents.
//!
//! - [`encode`]: session state to event XML
//! - [`decode`]: event XML back into the session
//! - [`store`]: the remote event store (HTTP client behind the `api` feature)
//! - [`cursor`]: round-robin position over the events of a time window

pub mod cursor;
pub mod decode;
pub mod dom;
pub mod encode;
pub mod error;
pub mod store;

pub use cursor::EventCursor;
pub use decode::{apply_event, parse_event, EventDocument};
pub use encode::encode_event;
pub use error::{EventError, Result};
pub use store::StoreSettings;

#[cfg(feature = "api")]
pub use store::EventStoreClient;
