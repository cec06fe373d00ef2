//! Domain Models
//! Mission: Member records and financial ledger entries

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Membership record
#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub id: Uuid,
    /// Human-readable member number, e.g. "TSOAM2026-001"
    pub member_id: String,
    /// Tithe number, e.g. "TS-2026-001"
    pub tithe_number: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub marital_status: Option<String>,
    pub address: Option<String>,
    pub occupation: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub membership_date: String,
    pub baptism_date: Option<String>,
    pub confirmation_date: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

/// Member creation payload; member/tithe numbers are generated by the store
#[derive(Debug, Clone, Deserialize)]
pub struct NewMember {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub marital_status: Option<String>,
    pub address: Option<String>,
    pub occupation: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    /// Defaults to today when absent
    pub membership_date: Option<String>,
    pub baptism_date: Option<String>,
    pub confirmation_date: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub is_active: Option<bool>,
}

/// Partial member update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub occupation: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub is_active: Option<bool>,
}

/// Member listing filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberFilters {
    pub is_active: Option<bool>,
    pub department: Option<String>,
    pub search: Option<String>,
    pub limit: Option<u32>,
}

/// Ledger entry direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "Income",
            TransactionKind::Expense => "Expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Income" => Some(TransactionKind::Income),
            "Expense" => Some(TransactionKind::Expense),
            _ => None,
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        TransactionKind::parse(value.as_str()?).ok_or(FromSqlError::InvalidType)
    }
}

/// Ledger entry approval state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Approved,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "Pending",
            TransactionStatus::Approved => "Approved",
            TransactionStatus::Rejected => "Rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(TransactionStatus::Pending),
            "Approved" => Some(TransactionStatus::Approved),
            "Rejected" => Some(TransactionStatus::Rejected),
            _ => None,
        }
    }
}

impl ToSql for TransactionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        TransactionStatus::parse(value.as_str()?).ok_or(FromSqlError::InvalidType)
    }
}

/// Financial ledger entry
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    /// Human-readable transaction number, e.g. "FTX20260001"
    pub transaction_id: String,
    pub kind: TransactionKind,
    pub category: String,
    pub subcategory: Option<String>,
    /// Amount in cents; sign is carried by `kind`, not the value
    pub amount_cents: i64,
    pub description: Option<String>,
    pub date: String,
    pub payment_method: Option<String>,
    pub reference_number: Option<String>,
    pub member_id: Option<String>,
    pub created_by: String,
    pub status: TransactionStatus,
    pub created_at: String,
}

/// Ledger entry creation payload; the transaction number is generated
#[derive(Debug, Clone, Deserialize)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub category: String,
    pub subcategory: Option<String>,
    pub amount_cents: i64,
    pub description: Option<String>,
    pub date: String,
    pub payment_method: Option<String>,
    pub reference_number: Option<String>,
    pub member_id: Option<String>,
    pub status: Option<TransactionStatus>,
}

/// Ledger listing filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilters {
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
    pub status: Option<TransactionStatus>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<u32>,
}

/// Date range for summary reports
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryRange {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Aggregated ledger totals over a date range
#[derive(Debug, Clone, Serialize)]
pub struct FinanceSummary {
    pub total_income_cents: i64,
    pub total_expense_cents: i64,
    pub net_cents: i64,
    pub by_category: Vec<CategoryTotal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryTotal {
    pub kind: TransactionKind,
    pub category: String,
    pub total_cents: i64,
}
