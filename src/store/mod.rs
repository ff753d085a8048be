//! Persistence layer: libSQL-backed storage for applicant records.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Applicant, Database, NewApplicant, UserId};
