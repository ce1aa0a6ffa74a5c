//! Cycle spend ledger with pre-flight admission.
//!
//! Every metered vendor call must pass through [`BudgetGovernor::add_cost`]
//! before the call is made, so the ledger doubles as an admission gate.
//! The ledger is in-memory only and is reset once per generation cycle.

use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

/// Errors from the budget ledger
#[derive(Debug, Error)]
pub enum BudgetError {
    #[error(
        "budget exceeded for '{label}': {candidate:.4} USD would pass max {max:.4} (current {current:.4})"
    )]
    Exceeded {
        label: String,
        current: f64,
        candidate: f64,
        max: f64,
    },
}

/// One committed ledger entry, retained for auditing until the next reset.
#[derive(Debug, Clone)]
pub struct CostEntry {
    pub label: String,
    pub amount: f64,
    pub total_after: f64,
}

#[derive(Debug, Default)]
struct Ledger {
    total: f64,
    entries: Vec<CostEntry>,
}

/// Atomic USD spend ledger for one generation cycle.
///
/// Check-then-commit: a rejected addition leaves the ledger untouched, so
/// the total is never left above the configured maximum.
pub struct BudgetGovernor {
    max: f64,
    ledger: Mutex<Ledger>,
}

impl BudgetGovernor {
    /// Create a governor with the given per-cycle maximum spend in USD
    pub fn new(max: f64) -> Self {
        Self {
            max,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Zero the ledger. Called once at the start of each generation cycle.
    pub fn reset_cycle(&self) {
        let mut ledger = self.lock();
        ledger.total = 0.0;
        ledger.entries.clear();
        debug!(max_usd = self.max, "budget ledger reset");
    }

    /// Record a metered cost, rejecting it if the cycle maximum would be
    /// passed. Returns the new running total on success.
    pub fn add_cost(&self, amount: f64, label: &str) -> Result<f64, BudgetError> {
        let mut ledger = self.lock();
        let candidate = round4(ledger.total + amount);

        if candidate > self.max {
            return Err(BudgetError::Exceeded {
                label: label.to_string(),
                current: ledger.total,
                candidate,
                max: self.max,
            });
        }

        ledger.total = candidate;
        ledger.entries.push(CostEntry {
            label: label.to_string(),
            amount,
            total_after: candidate,
        });
        debug!(label, amount_usd = amount, total_usd = candidate, "cost committed");

        Ok(candidate)
    }

    /// Current running total for this cycle in USD
    pub fn current_cost(&self) -> f64 {
        self.lock().total
    }

    /// Configured per-cycle maximum in USD
    pub fn max_cost(&self) -> f64 {
        self.max
    }

    /// Committed entries for this cycle, oldest first
    pub fn entries(&self) -> Vec<CostEntry> {
        self.lock().entries.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Ledger> {
        // Ledger mutation cannot panic mid-update, so a poisoned lock still
        // holds a consistent ledger.
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Round to 4 decimal places, half-up
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
