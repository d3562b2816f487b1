use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::diff::ChangeSet;
use crate::models::Snapshot;
use crate::paginate::Collection;

/// Counters describing one monitoring run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub run_id: Uuid,
    pub checked_at: DateTime<Utc>,
    pub total: usize,
    pub available: usize,
    pub out_of_stock: usize,
    pub new: usize,
    pub deleted: usize,
    pub went_out: usize,
    pub back_in: usize,
    pub price_changes: usize,
    pub pages_processed: u32,
    pub errors: u32,
}

impl RunStats {
    /// Tally the current snapshot and the classified changes of a run.
    pub fn compute(run_id: Uuid, current: &Snapshot, changes: &ChangeSet, collection: &Collection) -> Self {
        let available = current.available_count();
        Self {
            run_id,
            checked_at: Utc::now(),
            total: current.len(),
            available,
            out_of_stock: current.len() - available,
            new: changes.new.len(),
            deleted: changes.deleted.len(),
            went_out: changes.went_out_of_stock.len(),
            back_in: changes.came_back_in_stock.len(),
            price_changes: changes.price_changed.len(),
            pages_processed: collection.pages_processed,
            errors: collection.errors,
        }
    }

    pub fn total_changes(&self) -> usize {
        self.new + self.deleted + self.went_out + self.back_in + self.price_changes
    }

    /// Status transitions in either direction.
    pub fn status_changes(&self) -> usize {
        self.went_out + self.back_in
    }
}
