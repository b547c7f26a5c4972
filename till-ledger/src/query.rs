use chrono::{DateTime, Utc};

use crate::{Reference, TransactionType};

/// Filter describing which ledger entries to load from storage.
///
/// Every query is scoped to a device; the time range is half-open
/// (`start_time <= transaction_date < end_time`).
#[derive(Clone, Debug)]
pub struct LedgerQuery {
    pub device_id: i64,
    pub transaction_type: Option<TransactionType>,
    pub reference: Option<Reference>,
    pub created_by: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub ascending: bool,
}

impl LedgerQuery {
    pub fn for_device(device_id: i64) -> Self {
        Self {
            device_id,
            transaction_type: None,
            reference: None,
            created_by: None,
            start_time: None,
            end_time: None,
            limit: None,
            ascending: true,
        }
    }

    pub fn with_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_creator(mut self, created_by: i64) -> Self {
        self.created_by = Some(created_by);
        self
    }

    pub fn with_time_range(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }
}
