//! Elasticsearch backend: client, index management, query rendering and the
//! store implementations.

mod client;
mod query;
mod schema;
mod store;

pub use client::EsClient;
pub use schema::{create_index, create_indices};
pub use store::EsStore;
