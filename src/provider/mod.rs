//! Storage provider adapters.
//!
//! The [`adapter::Provider`] trait is the contract every storage backend
//! implements; [`registry::ProviderRegistry`] holds the configured set
//! and resolves which adapter serves a given session.

pub mod adapter;
pub mod registry;
