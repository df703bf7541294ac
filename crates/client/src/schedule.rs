//! Shift planning with a bulk save round trip.
//!
//! The store's answer to a bulk save is not trusted to be the reconciled
//! list, so every save is followed by a re-fetch of the planned range and a
//! merge by natural key. Temporary ids never survive a successful save, and
//! duplicate-looking records collapse to the persisted one.

use std::sync::Arc;

use chrono::NaiveDate;
use countertop_core::{EntityId, Shift, ShiftDraft, TempId, TempIdGenerator};
use tracing::{debug, info, instrument, warn};

use crate::error::PlanError;
use crate::reconcile::{self, Retain};
use crate::transport::ShiftStore;

/// Local shift plan for a date range.
#[derive(Debug)]
pub struct ShiftPlanner<S> {
    store: Arc<S>,
    from: NaiveDate,
    to: NaiveDate,
    shifts: Vec<Shift>,
    ids: TempIdGenerator,
}

impl<S: ShiftStore> ShiftPlanner<S> {
    /// Empty plan for `[from, to]`. The bounds are swapped if reversed.
    #[must_use]
    pub fn new(store: Arc<S>, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            store,
            from: from.min(to),
            to: from.max(to),
            shifts: Vec::new(),
            ids: TempIdGenerator::new(),
        }
    }

    /// Planned date range.
    #[must_use]
    pub const fn range(&self) -> (NaiveDate, NaiveDate) {
        (self.from, self.to)
    }

    /// Shifts in plan order.
    #[must_use]
    pub fn shifts(&self) -> &[Shift] {
        &self.shifts
    }

    /// Replace the plan with what the store holds for the range.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::Refetch` if the fetch fails; the plan is unchanged.
    #[instrument(skip(self), fields(from = %self.from, to = %self.to))]
    pub async fn load(&mut self) -> Result<&[Shift], PlanError> {
        let fetched = self
            .store
            .fetch(self.from, self.to)
            .await
            .map_err(PlanError::Refetch)?;
        self.shifts = reconcile::dedupe(&fetched, Shift::natural_key);
        debug!(count = self.shifts.len(), "Loaded shift plan");
        Ok(&self.shifts)
    }

    /// Add a shift under a temporary id.
    pub fn add(&mut self, draft: ShiftDraft) -> TempId {
        if draft.date < self.from || draft.date > self.to {
            warn!(
                date = %draft.date,
                from = %self.from,
                to = %self.to,
                "Shift outside the planned range will not be re-fetched"
            );
        }
        let id = self.ids.next_id();
        self.shifts.push(draft.into_shift(id));
        debug!(shift_id = %id, "Added shift");
        id
    }

    /// Remove the shift with `id`.
    pub fn remove(&mut self, id: EntityId) -> Option<Shift> {
        let index = self.shifts.iter().position(|s| s.id == id)?;
        reconcile::remove(&mut self.shifts, index)
    }

    /// Save the plan, re-fetch the range and reconcile.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::Save` or `PlanError::Refetch`. The local plan is
    /// unchanged on either error.
    #[instrument(skip(self), fields(from = %self.from, to = %self.to, count = self.shifts.len()))]
    pub async fn save(&mut self) -> Result<&[Shift], PlanError> {
        let outgoing = reconcile::dedupe(&self.shifts, Shift::natural_key);
        if outgoing.len() < self.shifts.len() {
            debug!(
                duplicates = self.shifts.len() - outgoing.len(),
                "Collapsed duplicate shifts before save"
            );
        }

        let saved = self.store.save(&outgoing).await.map_err(PlanError::Save)?;
        debug!(returned = saved.len(), "Shift plan saved");

        let fetched = self
            .store
            .fetch(self.from, self.to)
            .await
            .map_err(PlanError::Refetch)?;

        self.shifts = reconcile::merge(&outgoing, &fetched, Shift::natural_key, Retain::Persisted);
        info!(count = self.shifts.len(), "Shift plan reconciled");
        Ok(&self.shifts)
    }
}
