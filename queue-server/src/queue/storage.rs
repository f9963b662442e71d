//! redb-based storage layer for the turn queue
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `tickets` | `ticket_id` | `Ticket` (JSON) | Ticket records |
//! | `day_index` | `(date, daily_sequence)` | `ticket_id` | Per-day ordered index |
//! | `clients` | `phone` | `Client` (JSON) | Client directory |
//! | `closings` | `date` | `DailyClosing` (JSON) | 日结记录 (immutable) |
//! | `services` | `service_id` | `ServiceItem` (JSON) | Service catalog |
//! | `staff` | `staff_id` | `StaffRecord` (JSON) | Staff directory |
//! | `counters` | name | `u64` | Id counters |
//!
//! # Transactions
//!
//! redb admits one write transaction at a time. Every read-decide-write
//! sequence (sequence assignment, call-next, close-day) runs inside a single
//! [`WriteTransaction`], which makes it linearizable. `*_txn` methods read
//! or write inside the caller's transaction; the others open their own read
//! transaction.

use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::models::{Client, DailyClosing, ServiceItem, Ticket};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::staff::StaffRecord;
use crate::utils::{AppError, ErrorCode};

/// Table for tickets: key = ticket id, value = JSON-serialized Ticket
const TICKETS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("tickets");

/// Table for the per-day index: key = (date, daily_sequence), value = ticket id
const DAY_INDEX_TABLE: TableDefinition<(&str, u32), u64> = TableDefinition::new("day_index");

/// Table for clients: key = phone, value = JSON-serialized Client
const CLIENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("clients");

/// Table for daily closings: key = date, value = JSON-serialized DailyClosing
const CLOSINGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("closings");

/// Table for the service catalog: key = service id, value = JSON-serialized ServiceItem
const SERVICES_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("services");

/// Table for staff: key = staff id, value = JSON-serialized StaffRecord
const STAFF_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("staff");

/// Table for id counters: key = counter name, value = last issued id
const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

pub const TICKET_COUNTER: &str = "ticket";
pub const SERVICE_COUNTER: &str = "service";
pub const STAFF_COUNTER: &str = "staff";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// 将存储错误转换为错误码
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    if let StorageError::Serialization(_) = e {
        return ErrorCode::StorageCorrupted;
    }

    // redb 错误通过字符串匹配分类
    let err_str = e.to_string().to_lowercase();

    // 磁盘空间不足
    if err_str.contains("no space") || err_str.contains("disk full") || err_str.contains("enospc")
    {
        return ErrorCode::StorageFull;
    }

    // 数据损坏
    if err_str.contains("corrupt") || err_str.contains("invalid database") {
        return ErrorCode::StorageCorrupted;
    }

    // IO 错误：系统繁忙，可重试
    if is_io_error(e) {
        return ErrorCode::SystemBusy;
    }

    ErrorCode::DatabaseError
}

fn is_io_error(e: &StorageError) -> bool {
    let inner = match e {
        StorageError::Storage(s) => s,
        StorageError::Transaction(redb::TransactionError::Storage(s)) => s,
        StorageError::Table(redb::TableError::Storage(s)) => s,
        StorageError::Commit(redb::CommitError::Storage(s)) => s,
        _ => return false,
    };
    matches!(inner, redb::StorageError::Io(_))
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        let code = classify_storage_error(&err);
        tracing::error!(error = %err, error_code = ?code, "Storage error occurred");
        AppError::with_message(code, err.to_string())
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn encode<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Load a day's tickets in ascending `daily_sequence` order
fn load_day<I, T>(index: &I, tickets: &T, date: &str) -> StorageResult<Vec<Ticket>>
where
    I: ReadableTable<(&'static str, u32), u64>,
    T: ReadableTable<u64, &'static [u8]>,
{
    let mut out = Vec::new();
    for entry in index.range((date, 0u32)..=(date, u32::MAX))? {
        let (_key, id) = entry?;
        if let Some(bytes) = tickets.get(id.value())? {
            out.push(decode(bytes.value())?);
        }
    }
    Ok(out)
}

fn max_sequence<I>(index: &I, date: &str) -> StorageResult<u32>
where
    I: ReadableTable<(&'static str, u32), u64>,
{
    let last = index.range((date, 0u32)..=(date, u32::MAX))?.next_back();
    match last {
        Some(entry) => {
            let (key, _id) = entry?;
            Ok(key.value().1)
        }
        None => Ok(0),
    }
}

fn load_all<K, T, V>(table: &T) -> StorageResult<Vec<V>>
where
    K: redb::Key + 'static,
    T: ReadableTable<K, &'static [u8]>,
    V: DeserializeOwned,
{
    let mut out = Vec::new();
    for entry in table.iter()? {
        let (_key, value) = entry?;
        out.push(decode(value.value())?);
    }
    Ok(out)
}

/// Queue storage backed by redb
#[derive(Clone)]
pub struct QueueStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for QueueStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStorage").finish_non_exhaustive()
    }
}

impl QueueStorage {
    /// Open or create the database at the given path
    ///
    /// redb commits are durable once `commit()` returns; the file is
    /// copy-on-write and stays consistent across power loss.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests, throwaway instances)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            // Create all tables if they don't exist
            let _ = write_txn.open_table(TICKETS_TABLE)?;
            let _ = write_txn.open_table(DAY_INDEX_TABLE)?;
            let _ = write_txn.open_table(CLIENTS_TABLE)?;
            let _ = write_txn.open_table(CLOSINGS_TABLE)?;
            let _ = write_txn.open_table(SERVICES_TABLE)?;
            let _ = write_txn.open_table(STAFF_TABLE)?;
            let _ = write_txn.open_table(COUNTERS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    fn begin_read(&self) -> StorageResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    // ========== Counters ==========

    /// Increment and return the named counter (first id is 1)
    pub fn next_id(&self, txn: &WriteTransaction, counter: &str) -> StorageResult<u64> {
        let mut table = txn.open_table(COUNTERS_TABLE)?;
        let current = table.get(counter)?.map(|g| g.value()).unwrap_or(0);
        let next = current + 1;
        table.insert(counter, next)?;
        Ok(next)
    }

    // ========== Tickets ==========

    /// Insert a new ticket and index it under its business date
    pub fn insert_ticket(&self, txn: &WriteTransaction, ticket: &Ticket) -> StorageResult<()> {
        let date = shared::util::date_key(ticket.business_date());
        let value = encode(ticket)?;
        {
            let mut table = txn.open_table(TICKETS_TABLE)?;
            table.insert(ticket.id, value.as_slice())?;
        }
        let mut index = txn.open_table(DAY_INDEX_TABLE)?;
        index.insert((date.as_str(), ticket.daily_sequence), ticket.id)?;
        Ok(())
    }

    /// Replace a ticket record (id, date and sequence never change)
    pub fn update_ticket(&self, txn: &WriteTransaction, ticket: &Ticket) -> StorageResult<()> {
        let mut table = txn.open_table(TICKETS_TABLE)?;
        let value = encode(ticket)?;
        table.insert(ticket.id, value.as_slice())?;
        Ok(())
    }

    pub fn get_ticket(&self, id: u64) -> StorageResult<Option<Ticket>> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(TICKETS_TABLE)?;
        table.get(id)?.map(|v| decode(v.value())).transpose()
    }

    pub fn get_ticket_txn(&self, txn: &WriteTransaction, id: u64) -> StorageResult<Option<Ticket>> {
        let table = txn.open_table(TICKETS_TABLE)?;
        table.get(id)?.map(|v| decode(v.value())).transpose()
    }

    /// All tickets of a date, ascending by `daily_sequence`
    pub fn list_day(&self, date: &str) -> StorageResult<Vec<Ticket>> {
        let read_txn = self.begin_read()?;
        let index = read_txn.open_table(DAY_INDEX_TABLE)?;
        let tickets = read_txn.open_table(TICKETS_TABLE)?;
        load_day(&index, &tickets, date)
    }

    pub fn list_day_txn(&self, txn: &WriteTransaction, date: &str) -> StorageResult<Vec<Ticket>> {
        let index = txn.open_table(DAY_INDEX_TABLE)?;
        let tickets = txn.open_table(TICKETS_TABLE)?;
        load_day(&index, &tickets, date)
    }

    /// Highest `daily_sequence` issued for a date (0 when none)
    pub fn max_sequence_txn(&self, txn: &WriteTransaction, date: &str) -> StorageResult<u32> {
        let index = txn.open_table(DAY_INDEX_TABLE)?;
        max_sequence(&index, date)
    }

    // ========== Clients ==========

    pub fn get_client_txn(
        &self,
        txn: &WriteTransaction,
        phone: &str,
    ) -> StorageResult<Option<Client>> {
        let table = txn.open_table(CLIENTS_TABLE)?;
        table.get(phone)?.map(|v| decode(v.value())).transpose()
    }

    pub fn get_client(&self, phone: &str) -> StorageResult<Option<Client>> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(CLIENTS_TABLE)?;
        table.get(phone)?.map(|v| decode(v.value())).transpose()
    }

    pub fn put_client(&self, txn: &WriteTransaction, client: &Client) -> StorageResult<()> {
        let mut table = txn.open_table(CLIENTS_TABLE)?;
        let value = encode(client)?;
        table.insert(client.phone.as_str(), value.as_slice())?;
        Ok(())
    }

    // ========== Closings ==========

    pub fn get_closing(&self, date: &str) -> StorageResult<Option<DailyClosing>> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(CLOSINGS_TABLE)?;
        table.get(date)?.map(|v| decode(v.value())).transpose()
    }

    pub fn get_closing_txn(
        &self,
        txn: &WriteTransaction,
        date: &str,
    ) -> StorageResult<Option<DailyClosing>> {
        let table = txn.open_table(CLOSINGS_TABLE)?;
        table.get(date)?.map(|v| decode(v.value())).transpose()
    }

    pub fn insert_closing(
        &self,
        txn: &WriteTransaction,
        closing: &DailyClosing,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(CLOSINGS_TABLE)?;
        let value = encode(closing)?;
        table.insert(closing.date.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Most recent closings, newest date first
    pub fn list_closings(&self, limit: usize) -> StorageResult<Vec<DailyClosing>> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(CLOSINGS_TABLE)?;
        let mut out = Vec::new();
        for entry in table.iter()?.rev().take(limit) {
            let (_key, value) = entry?;
            out.push(decode(value.value())?);
        }
        Ok(out)
    }

    // ========== Services ==========

    pub fn get_service(&self, id: u64) -> StorageResult<Option<ServiceItem>> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SERVICES_TABLE)?;
        table.get(id)?.map(|v| decode(v.value())).transpose()
    }

    pub fn get_service_txn(
        &self,
        txn: &WriteTransaction,
        id: u64,
    ) -> StorageResult<Option<ServiceItem>> {
        let table = txn.open_table(SERVICES_TABLE)?;
        table.get(id)?.map(|v| decode(v.value())).transpose()
    }

    pub fn list_services(&self) -> StorageResult<Vec<ServiceItem>> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SERVICES_TABLE)?;
        load_all(&table)
    }

    pub fn put_service(&self, txn: &WriteTransaction, service: &ServiceItem) -> StorageResult<()> {
        let mut table = txn.open_table(SERVICES_TABLE)?;
        let value = encode(service)?;
        table.insert(service.id, value.as_slice())?;
        Ok(())
    }

    // ========== Staff ==========

    pub fn get_staff(&self, id: u64) -> StorageResult<Option<StaffRecord>> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(STAFF_TABLE)?;
        table.get(id)?.map(|v| decode(v.value())).transpose()
    }

    pub fn get_staff_txn(
        &self,
        txn: &WriteTransaction,
        id: u64,
    ) -> StorageResult<Option<StaffRecord>> {
        let table = txn.open_table(STAFF_TABLE)?;
        table.get(id)?.map(|v| decode(v.value())).transpose()
    }

    pub fn list_staff(&self) -> StorageResult<Vec<StaffRecord>> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(STAFF_TABLE)?;
        load_all(&table)
    }

    pub fn list_staff_txn(&self, txn: &WriteTransaction) -> StorageResult<Vec<StaffRecord>> {
        let table = txn.open_table(STAFF_TABLE)?;
        load_all(&table)
    }

    pub fn put_staff(&self, txn: &WriteTransaction, staff: &StaffRecord) -> StorageResult<()> {
        let mut table = txn.open_table(STAFF_TABLE)?;
        let value = encode(staff)?;
        table.insert(staff.id, value.as_slice())?;
        Ok(())
    }

    /// Remove a staff record, returns whether it existed
    pub fn remove_staff(&self, txn: &WriteTransaction, id: u64) -> StorageResult<bool> {
        let mut table = txn.open_table(STAFF_TABLE)?;
        let removed = table.remove(id)?.is_some();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{EscalationLevel, TicketState};

    // 2026-02-20T12:00:00Z
    const NOON: i64 = 1_771_588_800_000;
    const DAY_MS: i64 = 86_400_000;

    fn ticket(id: u64, seq: u32, created_at: i64) -> Ticket {
        Ticket {
            id,
            daily_sequence: seq,
            state: TicketState::Queued,
            client_phone: format!("555{id:04}"),
            client_name: format!("Client {id}"),
            requested_staff_id: None,
            assigned_staff_id: None,
            assigned_staff_name: None,
            created_at,
            service_started_at: None,
            escalation_level: EscalationLevel::None,
            line_items: vec![],
            total: None,
            cancelled_at: None,
            closed_at: None,
        }
    }

    #[test]
    fn test_day_index_isolates_dates() {
        let storage = QueueStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        storage.insert_ticket(&txn, &ticket(1, 1, NOON)).unwrap();
        storage.insert_ticket(&txn, &ticket(2, 2, NOON + 1)).unwrap();
        storage
            .insert_ticket(&txn, &ticket(3, 1, NOON + DAY_MS))
            .unwrap();
        assert_eq!(storage.max_sequence_txn(&txn, "2026-02-20").unwrap(), 2);
        assert_eq!(storage.max_sequence_txn(&txn, "2026-02-21").unwrap(), 1);
        assert_eq!(storage.max_sequence_txn(&txn, "2026-02-22").unwrap(), 0);
        txn.commit().unwrap();

        let day = storage.list_day("2026-02-20").unwrap();
        let ids: Vec<u64> = day.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(storage.list_day("2026-02-21").unwrap().len(), 1);
    }

    #[test]
    fn test_uncommitted_write_is_discarded() {
        let storage = QueueStorage::open_in_memory().unwrap();
        {
            let txn = storage.begin_write().unwrap();
            storage.insert_ticket(&txn, &ticket(1, 1, NOON)).unwrap();
            // dropped without commit
        }
        assert!(storage.get_ticket(1).unwrap().is_none());
        assert!(storage.list_day("2026-02-20").unwrap().is_empty());
    }

    #[test]
    fn test_counters_are_independent() {
        let storage = QueueStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        assert_eq!(storage.next_id(&txn, TICKET_COUNTER).unwrap(), 1);
        assert_eq!(storage.next_id(&txn, TICKET_COUNTER).unwrap(), 2);
        assert_eq!(storage.next_id(&txn, SERVICE_COUNTER).unwrap(), 1);
        txn.commit().unwrap();

        let txn = storage.begin_write().unwrap();
        assert_eq!(storage.next_id(&txn, TICKET_COUNTER).unwrap(), 3);
    }

    #[test]
    fn test_closings_listed_newest_first() {
        let storage = QueueStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        for date in ["2026-02-18", "2026-02-20", "2026-02-19"] {
            let closing = DailyClosing {
                date: date.to_string(),
                closed_at: NOON,
                total_collected: rust_decimal::Decimal::ZERO,
                ticket_count: 0,
                closed_by_id: 1,
                closed_by_name: "Admin".into(),
            };
            storage.insert_closing(&txn, &closing).unwrap();
        }
        txn.commit().unwrap();

        let dates: Vec<String> = storage
            .list_closings(2)
            .unwrap()
            .into_iter()
            .map(|c| c.date)
            .collect();
        assert_eq!(dates, vec!["2026-02-20", "2026-02-19"]);
    }

    #[test]
    fn test_storage_error_classification() {
        let corrupt: StorageError = serde_json::from_str::<Ticket>("{").unwrap_err().into();
        assert_eq!(classify_storage_error(&corrupt), ErrorCode::StorageCorrupted);

        let io = StorageError::Storage(redb::StorageError::Io(std::io::Error::other(
            "broken pipe",
        )));
        assert_eq!(classify_storage_error(&io), ErrorCode::SystemBusy);

        let missing = StorageError::Table(redb::TableError::TableDoesNotExist("tickets".into()));
        assert_eq!(classify_storage_error(&missing), ErrorCode::DatabaseError);
        assert_eq!(AppError::from(missing).code, ErrorCode::DatabaseError);
    }
}
