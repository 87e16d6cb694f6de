//! Postgres persistence for the cadence scheduling pipeline.
//!
//! The store is the single source of truth for post state. Every lifecycle
//! transition is an atomic conditional update (`UPDATE ... WHERE status = ...`
//! returning affected rows), which is the pipeline's sole concurrency-control
//! primitive: at most one claimer or worker wins any given transition.
//!
//! Consumers depend on the port traits in [`ports`]; [`PgStore`] is the
//! production adapter.

mod error;
mod pg;
pub mod ports;

pub use error::StoreError;
pub use pg::PgStore;
pub use ports::{BookingStore, ClaimStore, ConflictInfo, InsertOutcome, PublishStore};
