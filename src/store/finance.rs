//! Financial Ledger Storage
//! Mission: Persist transactions with generated transaction numbers

use crate::models::{
    CategoryTotal, FinanceSummary, NewTransaction, SummaryRange, Transaction, TransactionFilters,
    TransactionKind, TransactionStatus,
};
use crate::store::uuid_column;
use anyhow::{bail, Context, Result};
use chrono::{Datelike, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

/// Transaction storage with SQLite backend
pub struct FinanceStore {
    db_path: String,
}

impl FinanceStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path).context("Failed to open finance database")
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS financial_transactions (
                id TEXT PRIMARY KEY,
                transaction_id TEXT UNIQUE NOT NULL,
                kind TEXT NOT NULL,
                category TEXT NOT NULL,
                subcategory TEXT,
                amount_cents INTEGER NOT NULL,
                description TEXT,
                date TEXT NOT NULL,
                payment_method TEXT,
                reference_number TEXT,
                member_id TEXT,
                created_by TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'Pending',
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    const TX_COLUMNS: &'static str = "id, transaction_id, kind, category, subcategory, \
         amount_cents, description, date, payment_method, reference_number, member_id, \
         created_by, status, created_at";

    fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
        Ok(Transaction {
            id: uuid_column(row, 0)?,
            transaction_id: row.get(1)?,
            kind: row.get(2)?,
            category: row.get(3)?,
            subcategory: row.get(4)?,
            amount_cents: row.get(5)?,
            description: row.get(6)?,
            date: row.get(7)?,
            payment_method: row.get(8)?,
            reference_number: row.get(9)?,
            member_id: row.get(10)?,
            created_by: row.get(11)?,
            status: row.get(12)?,
            created_at: row.get(13)?,
        })
    }

    /// Next transaction number for the current year, e.g. "FTX20260001"
    fn next_transaction_id(conn: &Connection, year: i32) -> Result<String> {
        let prefix = format!("FTX{}", year);
        let last: Option<String> = conn
            .query_row(
                "SELECT transaction_id FROM financial_transactions
                 WHERE transaction_id LIKE ?1 ORDER BY transaction_id DESC LIMIT 1",
                params![format!("{}%", prefix)],
                |row| row.get(0),
            )
            .optional()?;

        let next = last
            .as_deref()
            .and_then(|id| id.get(prefix.len()..))
            .and_then(|n| n.parse::<u32>().ok())
            .map_or(1, |n| n + 1);

        Ok(format!("{}{:04}", prefix, next))
    }

    /// Record a ledger entry, generating its transaction number
    pub fn create(&self, new: &NewTransaction, created_by: &str) -> Result<Transaction> {
        if new.amount_cents <= 0 {
            bail!("Amount must be positive");
        }

        let conn = self.open()?;
        let now = Utc::now();

        let tx = Transaction {
            id: Uuid::new_v4(),
            transaction_id: Self::next_transaction_id(&conn, now.year())?,
            kind: new.kind,
            category: new.category.clone(),
            subcategory: new.subcategory.clone(),
            amount_cents: new.amount_cents,
            description: new.description.clone(),
            date: new.date.clone(),
            payment_method: new.payment_method.clone(),
            reference_number: new.reference_number.clone(),
            member_id: new.member_id.clone(),
            created_by: created_by.to_string(),
            status: new.status.unwrap_or(TransactionStatus::Pending),
            created_at: now.to_rfc3339(),
        };

        conn.execute(
            "INSERT INTO financial_transactions (
                id, transaction_id, kind, category, subcategory, amount_cents,
                description, date, payment_method, reference_number, member_id,
                created_by, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                tx.id.to_string(),
                tx.transaction_id,
                tx.kind,
                tx.category,
                tx.subcategory,
                tx.amount_cents,
                tx.description,
                tx.date,
                tx.payment_method,
                tx.reference_number,
                tx.member_id,
                tx.created_by,
                tx.status,
                tx.created_at,
            ],
        )
        .context("Failed to insert transaction")?;

        info!(
            "✅ Recorded {} {} ({} cents)",
            tx.kind.as_str(),
            tx.transaction_id,
            tx.amount_cents
        );

        Ok(tx)
    }

    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>> {
        let conn = self.open()?;
        let sql = format!(
            "SELECT {} FROM financial_transactions WHERE id = ?1",
            Self::TX_COLUMNS
        );

        conn.query_row(&sql, params![id.to_string()], Self::row_to_transaction)
            .optional()
            .context("Failed to load transaction")
    }

    pub fn list(&self, filters: &TransactionFilters) -> Result<Vec<Transaction>> {
        let conn = self.open()?;

        let mut sql = format!(
            "SELECT {} FROM financial_transactions WHERE 1=1",
            Self::TX_COLUMNS
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(kind) = filters.kind {
            sql.push_str(" AND kind = ?");
            args.push(Box::new(kind.as_str().to_string()));
        }
        if let Some(category) = &filters.category {
            sql.push_str(" AND category = ?");
            args.push(Box::new(category.clone()));
        }
        if let Some(status) = filters.status {
            sql.push_str(" AND status = ?");
            args.push(Box::new(status.as_str().to_string()));
        }
        if let Some(from) = &filters.from {
            sql.push_str(" AND date >= ?");
            args.push(Box::new(from.clone()));
        }
        if let Some(to) = &filters.to {
            sql.push_str(" AND date <= ?");
            args.push(Box::new(to.clone()));
        }

        sql.push_str(" ORDER BY date DESC, transaction_id DESC");

        if let Some(limit) = filters.limit {
            sql.push_str(" LIMIT ?");
            args.push(Box::new(limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let txs = stmt
            .query_map(
                rusqlite::params_from_iter(args.iter()),
                Self::row_to_transaction,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(txs)
    }

    /// Move a transaction through its approval workflow
    pub fn update_status(&self, id: Uuid, status: TransactionStatus) -> Result<Option<Transaction>> {
        let conn = self.open()?;

        conn.execute(
            "UPDATE financial_transactions SET status = ?1 WHERE id = ?2",
            params![status, id.to_string()],
        )?;

        drop(conn);
        self.find_by_id(id)
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        let conn = self.open()?;

        let rows = conn.execute(
            "DELETE FROM financial_transactions WHERE id = ?1",
            params![id.to_string()],
        )?;
        if rows == 0 {
            bail!("Transaction not found");
        }

        info!("🗑️  Deleted transaction {}", id);
        Ok(())
    }

    /// Totals per kind and category over an optional date range.
    ///
    /// Rejected entries never count towards totals.
    pub fn summary(&self, range: &SummaryRange) -> Result<FinanceSummary> {
        let conn = self.open()?;

        let mut sql = String::from(
            "SELECT kind, category, SUM(amount_cents) FROM financial_transactions
             WHERE status != 'Rejected'",
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(from) = &range.from {
            sql.push_str(" AND date >= ?");
            args.push(Box::new(from.clone()));
        }
        if let Some(to) = &range.to {
            sql.push_str(" AND date <= ?");
            args.push(Box::new(to.clone()));
        }

        sql.push_str(" GROUP BY kind, category ORDER BY kind, category");

        let mut stmt = conn.prepare(&sql)?;
        let by_category = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), |row| {
                Ok(CategoryTotal {
                    kind: row.get(0)?,
                    category: row.get(1)?,
                    total_cents: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let total_income_cents: i64 = by_category
            .iter()
            .filter(|c| c.kind == TransactionKind::Income)
            .map(|c| c.total_cents)
            .sum();
        let total_expense_cents: i64 = by_category
            .iter()
            .filter(|c| c.kind == TransactionKind::Expense)
            .map(|c| c.total_cents)
            .sum();

        Ok(FinanceSummary {
            total_income_cents,
            total_expense_cents,
            net_cents: total_income_cents - total_expense_cents,
            by_category,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (FinanceStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = FinanceStore::new(temp_file.path().to_str().unwrap()).unwrap();
        (store, temp_file)
    }

    fn entry(kind: TransactionKind, category: &str, amount_cents: i64, date: &str) -> NewTransaction {
        NewTransaction {
            kind,
            category: category.to_string(),
            subcategory: None,
            amount_cents,
            description: None,
            date: date.to_string(),
            payment_method: None,
            reference_number: None,
            member_id: None,
            status: Some(TransactionStatus::Approved),
        }
    }

    #[test]
    fn test_transaction_numbers_are_sequential() {
        let (store, _temp) = create_test_store();
        let year = Utc::now().year();

        let first = store
            .create(&entry(TransactionKind::Income, "Tithe", 5000, "2026-01-04"), "admin@local")
            .unwrap();
        let second = store
            .create(&entry(TransactionKind::Expense, "Utilities", 1200, "2026-01-05"), "admin@local")
            .unwrap();

        assert_eq!(first.transaction_id, format!("FTX{}0001", year));
        assert_eq!(second.transaction_id, format!("FTX{}0002", year));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let (store, _temp) = create_test_store();

        assert!(store
            .create(&entry(TransactionKind::Income, "Tithe", 0, "2026-01-04"), "x")
            .is_err());
        assert!(store
            .create(&entry(TransactionKind::Income, "Tithe", -100, "2026-01-04"), "x")
            .is_err());
    }

    #[test]
    fn test_list_filters() {
        let (store, _temp) = create_test_store();

        store
            .create(&entry(TransactionKind::Income, "Tithe", 5000, "2026-01-04"), "a")
            .unwrap();
        store
            .create(&entry(TransactionKind::Income, "Offering", 2500, "2026-01-11"), "a")
            .unwrap();
        store
            .create(&entry(TransactionKind::Expense, "Utilities", 1200, "2026-01-15"), "a")
            .unwrap();

        let income = store
            .list(&TransactionFilters {
                kind: Some(TransactionKind::Income),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(income.len(), 2);

        let january_middle = store
            .list(&TransactionFilters {
                from: Some("2026-01-10".to_string()),
                to: Some("2026-01-14".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(january_middle.len(), 1);
        assert_eq!(january_middle[0].category, "Offering");
    }

    #[test]
    fn test_summary_excludes_rejected() {
        let (store, _temp) = create_test_store();

        store
            .create(&entry(TransactionKind::Income, "Tithe", 5000, "2026-01-04"), "a")
            .unwrap();
        store
            .create(&entry(TransactionKind::Income, "Tithe", 3000, "2026-01-11"), "a")
            .unwrap();
        store
            .create(&entry(TransactionKind::Expense, "Utilities", 1200, "2026-01-15"), "a")
            .unwrap();
        let rejected = store
            .create(&entry(TransactionKind::Expense, "Misc", 9999, "2026-01-16"), "a")
            .unwrap();
        store
            .update_status(rejected.id, TransactionStatus::Rejected)
            .unwrap();

        let summary = store.summary(&SummaryRange::default()).unwrap();
        assert_eq!(summary.total_income_cents, 8000);
        assert_eq!(summary.total_expense_cents, 1200);
        assert_eq!(summary.net_cents, 6800);

        let tithe = summary
            .by_category
            .iter()
            .find(|c| c.category == "Tithe")
            .unwrap();
        assert_eq!(tithe.total_cents, 8000);
    }

    #[test]
    fn test_status_workflow() {
        let (store, _temp) = create_test_store();

        let mut pending = entry(TransactionKind::Income, "Tithe", 5000, "2026-01-04");
        pending.status = None;
        let tx = store.create(&pending, "a").unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);

        let approved = store
            .update_status(tx.id, TransactionStatus::Approved)
            .unwrap()
            .unwrap();
        assert_eq!(approved.status, TransactionStatus::Approved);
    }
}
