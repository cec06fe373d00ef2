//! Persistence layer for member records and the financial ledger.
//!
//! Stores open a fresh SQLite connection per operation and create their
//! schema on construction. Sequential human-readable IDs are derived from
//! the highest stored ID with the current year's prefix.

pub mod finance;
pub mod members;

pub use finance::FinanceStore;
pub use members::MemberStore;

use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

/// Read a TEXT column as a Uuid, surfacing parse failures as conversion
/// errors instead of panicking mid-query.
pub(crate) fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
