//! Kabox metadata persistence
//!
//! File records are spread over several interchangeable databases. Every backend
//! implements [`RecordStore`]. The [`RecordStoreRegistry`] writes each record to exactly one
//! database chosen round-robin and resolves lookups by scanning all databases in registry
//! order.

pub mod factory;
pub mod postgres;
pub mod registry;
pub mod supabase;
pub mod traits;
pub mod turso;

pub use factory::create_record_stores;
pub use kabox_core::DatabaseBackend;
pub use postgres::PostgresRecordStore;
pub use registry::{RecordStoreRegistry, WriteReceipt};
pub use supabase::SupabaseRecordStore;
pub use traits::{DbError, DbResult, RecordStore};
pub use turso::TursoRecordStore;
