//! Session persistence layer.
//!
//! The session store keeps track of upload sessions between creation and
//! completion.  The [`store::SessionStore`] trait defines the interface;
//! [`memory::MemorySessionStore`] is the bundled in-memory implementation.

pub mod memory;
pub mod store;
