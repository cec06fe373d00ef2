//! Member Storage
//! Mission: Persist membership records with generated member numbers

use crate::models::{Member, MemberFilters, MemberUpdate, NewMember};
use crate::store::uuid_column;
use anyhow::{bail, Context, Result};
use chrono::{Datelike, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

/// Member storage with SQLite backend
pub struct MemberStore {
    db_path: String,
}

impl MemberStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path).context("Failed to open member database")
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS members (
                id TEXT PRIMARY KEY,
                member_id TEXT UNIQUE NOT NULL,
                tithe_number TEXT UNIQUE NOT NULL,
                full_name TEXT NOT NULL,
                email TEXT,
                phone TEXT,
                date_of_birth TEXT,
                gender TEXT,
                marital_status TEXT,
                address TEXT,
                occupation TEXT,
                emergency_contact_name TEXT,
                emergency_contact_phone TEXT,
                membership_date TEXT NOT NULL,
                baptism_date TEXT,
                confirmation_date TEXT,
                department TEXT,
                position TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    const MEMBER_COLUMNS: &'static str = "id, member_id, tithe_number, full_name, email, phone, \
         date_of_birth, gender, marital_status, address, occupation, emergency_contact_name, \
         emergency_contact_phone, membership_date, baptism_date, confirmation_date, department, \
         position, is_active, created_at";

    fn row_to_member(row: &Row<'_>) -> rusqlite::Result<Member> {
        Ok(Member {
            id: uuid_column(row, 0)?,
            member_id: row.get(1)?,
            tithe_number: row.get(2)?,
            full_name: row.get(3)?,
            email: row.get(4)?,
            phone: row.get(5)?,
            date_of_birth: row.get(6)?,
            gender: row.get(7)?,
            marital_status: row.get(8)?,
            address: row.get(9)?,
            occupation: row.get(10)?,
            emergency_contact_name: row.get(11)?,
            emergency_contact_phone: row.get(12)?,
            membership_date: row.get(13)?,
            baptism_date: row.get(14)?,
            confirmation_date: row.get(15)?,
            department: row.get(16)?,
            position: row.get(17)?,
            is_active: row.get(18)?,
            created_at: row.get(19)?,
        })
    }

    /// Next member number for the current year, e.g. "TSOAM2026-001".
    ///
    /// Derived from the highest stored number sharing the year prefix;
    /// the first member of a year gets -001.
    fn next_member_id(conn: &Connection, year: i32) -> Result<String> {
        let prefix = format!("TSOAM{}", year);
        let last: Option<String> = conn
            .query_row(
                "SELECT member_id FROM members WHERE member_id LIKE ?1
                 ORDER BY member_id DESC LIMIT 1",
                params![format!("{}-%", prefix)],
                |row| row.get(0),
            )
            .optional()?;

        let next = last
            .as_deref()
            .and_then(|id| id.rsplit('-').next())
            .and_then(|n| n.parse::<u32>().ok())
            .map_or(1, |n| n + 1);

        Ok(format!("{}-{:03}", prefix, next))
    }

    /// Next tithe number for the current year, e.g. "TS-2026-001".
    fn next_tithe_number(conn: &Connection, year: i32) -> Result<String> {
        let prefix = format!("TS-{}", year);
        let last: Option<String> = conn
            .query_row(
                "SELECT tithe_number FROM members WHERE tithe_number LIKE ?1
                 ORDER BY tithe_number DESC LIMIT 1",
                params![format!("{}-%", prefix)],
                |row| row.get(0),
            )
            .optional()?;

        let next = last
            .as_deref()
            .and_then(|id| id.rsplit('-').next())
            .and_then(|n| n.parse::<u32>().ok())
            .map_or(1, |n| n + 1);

        Ok(format!("{}-{:03}", prefix, next))
    }

    /// Create a member, generating member and tithe numbers
    pub fn create(&self, new: &NewMember) -> Result<Member> {
        let conn = self.open()?;
        let now = Utc::now();
        let year = now.year();

        let member = Member {
            id: Uuid::new_v4(),
            member_id: Self::next_member_id(&conn, year)?,
            tithe_number: Self::next_tithe_number(&conn, year)?,
            full_name: new.full_name.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            date_of_birth: new.date_of_birth.clone(),
            gender: new.gender.clone(),
            marital_status: new.marital_status.clone(),
            address: new.address.clone(),
            occupation: new.occupation.clone(),
            emergency_contact_name: new.emergency_contact_name.clone(),
            emergency_contact_phone: new.emergency_contact_phone.clone(),
            membership_date: new
                .membership_date
                .clone()
                .unwrap_or_else(|| now.format("%Y-%m-%d").to_string()),
            baptism_date: new.baptism_date.clone(),
            confirmation_date: new.confirmation_date.clone(),
            department: new.department.clone(),
            position: new.position.clone(),
            is_active: new.is_active.unwrap_or(true),
            created_at: now.to_rfc3339(),
        };

        conn.execute(
            "INSERT INTO members (
                id, member_id, tithe_number, full_name, email, phone,
                date_of_birth, gender, marital_status, address, occupation,
                emergency_contact_name, emergency_contact_phone, membership_date,
                baptism_date, confirmation_date, department, position, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            params![
                member.id.to_string(),
                member.member_id,
                member.tithe_number,
                member.full_name,
                member.email,
                member.phone,
                member.date_of_birth,
                member.gender,
                member.marital_status,
                member.address,
                member.occupation,
                member.emergency_contact_name,
                member.emergency_contact_phone,
                member.membership_date,
                member.baptism_date,
                member.confirmation_date,
                member.department,
                member.position,
                member.is_active,
                member.created_at,
            ],
        )
        .context("Failed to insert member")?;

        info!("✅ Created member {} ({})", member.member_id, member.full_name);

        Ok(member)
    }

    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Member>> {
        let conn = self.open()?;
        let sql = format!("SELECT {} FROM members WHERE id = ?1", Self::MEMBER_COLUMNS);

        conn.query_row(&sql, params![id.to_string()], Self::row_to_member)
            .optional()
            .context("Failed to load member")
    }

    pub fn list(&self, filters: &MemberFilters) -> Result<Vec<Member>> {
        let conn = self.open()?;

        let mut sql = format!("SELECT {} FROM members WHERE 1=1", Self::MEMBER_COLUMNS);
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(is_active) = filters.is_active {
            sql.push_str(" AND is_active = ?");
            args.push(Box::new(is_active));
        }
        if let Some(department) = &filters.department {
            sql.push_str(" AND department = ?");
            args.push(Box::new(department.clone()));
        }
        if let Some(search) = &filters.search {
            sql.push_str(
                " AND (full_name LIKE ? OR email LIKE ? OR phone LIKE ? OR member_id LIKE ?)",
            );
            let term = format!("%{}%", search);
            for _ in 0..4 {
                args.push(Box::new(term.clone()));
            }
        }

        sql.push_str(" ORDER BY created_at DESC");

        if let Some(limit) = filters.limit {
            sql.push_str(" LIMIT ?");
            args.push(Box::new(limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let members = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), Self::row_to_member)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(members)
    }

    pub fn update(&self, id: Uuid, changes: &MemberUpdate) -> Result<Option<Member>> {
        let conn = self.open()?;

        let mut fields: Vec<&str> = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(full_name) = &changes.full_name {
            fields.push("full_name = ?");
            args.push(Box::new(full_name.clone()));
        }
        if let Some(email) = &changes.email {
            fields.push("email = ?");
            args.push(Box::new(email.clone()));
        }
        if let Some(phone) = &changes.phone {
            fields.push("phone = ?");
            args.push(Box::new(phone.clone()));
        }
        if let Some(address) = &changes.address {
            fields.push("address = ?");
            args.push(Box::new(address.clone()));
        }
        if let Some(occupation) = &changes.occupation {
            fields.push("occupation = ?");
            args.push(Box::new(occupation.clone()));
        }
        if let Some(department) = &changes.department {
            fields.push("department = ?");
            args.push(Box::new(department.clone()));
        }
        if let Some(position) = &changes.position {
            fields.push("position = ?");
            args.push(Box::new(position.clone()));
        }
        if let Some(is_active) = changes.is_active {
            fields.push("is_active = ?");
            args.push(Box::new(is_active));
        }

        if fields.is_empty() {
            bail!("No fields to update");
        }

        let sql = format!("UPDATE members SET {} WHERE id = ?", fields.join(", "));
        args.push(Box::new(id.to_string()));

        conn.execute(&sql, rusqlite::params_from_iter(args.iter()))
            .context("Failed to update member")?;

        drop(conn);
        self.find_by_id(id)
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        let conn = self.open()?;

        let rows = conn.execute(
            "DELETE FROM members WHERE id = ?1",
            params![id.to_string()],
        )?;
        if rows == 0 {
            bail!("Member not found");
        }

        info!("🗑️  Deleted member {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (MemberStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = MemberStore::new(temp_file.path().to_str().unwrap()).unwrap();
        (store, temp_file)
    }

    fn minimal_member(name: &str) -> NewMember {
        NewMember {
            full_name: name.to_string(),
            email: None,
            phone: None,
            date_of_birth: None,
            gender: None,
            marital_status: None,
            address: None,
            occupation: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            membership_date: None,
            baptism_date: None,
            confirmation_date: None,
            department: None,
            position: None,
            is_active: None,
        }
    }

    #[test]
    fn test_member_numbers_are_sequential() {
        let (store, _temp) = create_test_store();
        let year = Utc::now().year();

        let first = store.create(&minimal_member("Alice A")).unwrap();
        let second = store.create(&minimal_member("Bob B")).unwrap();

        assert_eq!(first.member_id, format!("TSOAM{}-001", year));
        assert_eq!(second.member_id, format!("TSOAM{}-002", year));
        assert_eq!(first.tithe_number, format!("TS-{}-001", year));
        assert_eq!(second.tithe_number, format!("TS-{}-002", year));
    }

    #[test]
    fn test_create_defaults() {
        let (store, _temp) = create_test_store();

        let member = store.create(&minimal_member("Carol C")).unwrap();
        assert!(member.is_active);
        // Defaulted membership date is an ISO day
        assert_eq!(member.membership_date.len(), 10);
    }

    #[test]
    fn test_list_filters_and_search() {
        let (store, _temp) = create_test_store();

        let mut a = minimal_member("Dan Delta");
        a.department = Some("Choir".to_string());
        store.create(&a).unwrap();

        let mut b = minimal_member("Erin Echo");
        b.email = Some("erin@example.org".to_string());
        store.create(&b).unwrap();

        let choir = store
            .list(&MemberFilters {
                department: Some("Choir".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(choir.len(), 1);
        assert_eq!(choir[0].full_name, "Dan Delta");

        let by_email = store
            .list(&MemberFilters {
                search: Some("erin@".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_email.len(), 1);

        let limited = store
            .list(&MemberFilters {
                limit: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_update_and_delete() {
        let (store, _temp) = create_test_store();

        let member = store.create(&minimal_member("Fay Fox")).unwrap();

        let updated = store
            .update(
                member.id,
                &MemberUpdate {
                    department: Some("Ushering".to_string()),
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.department.as_deref(), Some("Ushering"));
        assert!(!updated.is_active);

        store.delete(member.id).unwrap();
        assert!(store.find_by_id(member.id).unwrap().is_none());
        assert!(store.delete(member.id).is_err());
    }
}
