//! The embedded relational store: schema, migrator, and connection
//! management (`spec.md` §4.3, §5).

mod error;
mod migrations;
mod migrator;
pub mod schema;
mod store;

pub use error::{Result, StoreError};
pub use migrator::Migrator;
pub use store::Store;
