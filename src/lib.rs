//! Copiloto sales dashboard service.
//!
//! Backend-for-frontend over the hosted database that holds the sales data:
//! it signs sellers in, reads pre-aggregated views on their behalf, caches a
//! per-seller data bundle and derives what each dashboard page shows.
//!
//! # Modules
//!
//! - `api`: HTTP surface (handlers, auth guard, route table).
//! - `core`: Domain models, errors, sessions and page derivations.
//! - `integrations`: Backend client and query modules.
//! - `backend_client`: Hosted database/auth client.
//! - `cache_validator`: Checksummed envelopes for persisted blobs.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: Page endpoints.
//! - `kv_store`: Persistent key-value store.
//! - `middleware`: Session guard and extractor.
//! - `models`: Row schemas and typed shapes.
//! - `queries`: One read module per domain.
//! - `routes`: Route table.
//! - `session`: Sign-in state machine and session storage.
//! - `text`: Text normalization and pt-BR formatting.
//! - `user_data`: Per-seller cached data bundle.
//! - `view`: Search, sort, ranking and grouping over fetched rows.
//! - `view_query`: View query builder.

pub mod api;
pub mod core;
pub mod integrations;

pub mod backend_client;
pub mod cache_validator;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod kv_store;
pub mod middleware;
pub mod models;
pub mod queries;
pub mod routes;
pub mod session;
pub mod text;
pub mod user_data;
pub mod view;
pub mod view_query;
