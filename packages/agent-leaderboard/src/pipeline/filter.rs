//! The growing set of accepted records, unique by address.

use std::collections::HashSet;

use crate::types::record::SaleRecord;
use crate::types::run::DropReason;

/// Accepted records in discovery order; addresses compare case-insensitively.
#[derive(Debug, Default)]
pub struct RecordSet {
    records: Vec<SaleRecord>,
    addresses: HashSet<String>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `record` unless its address was already seen.
    pub fn admit(&mut self, record: SaleRecord) -> Result<(), DropReason> {
        if !self.addresses.insert(record.address_key()) {
            return Err(DropReason::DupAddress);
        }
        self.records.push(record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SaleRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<SaleRecord> {
        self.records
    }
}
