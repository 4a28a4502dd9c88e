//! Inventory propagation results.

use serde::{Deserialize, Serialize};

use super::product::ProductId;

/// Errors that can occur when constructing an [`InventoryQuantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Inventory quantities are absolute and cannot be negative.
    #[error("inventory quantity must be non-negative (got {0})")]
    Negative(i64),
}

/// An absolute, non-negative inventory quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct InventoryQuantity(i64);

impl InventoryQuantity {
    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::Negative` for values below zero.
    pub const fn new(quantity: i64) -> Result<Self, QuantityError> {
        if quantity < 0 {
            return Err(QuantityError::Negative(quantity));
        }
        Ok(Self(quantity))
    }

    /// Get the underlying value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for InventoryQuantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InventoryQuantity> for i64 {
    fn from(quantity: InventoryQuantity) -> Self {
        quantity.0
    }
}

/// Outcome of updating one child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChildStatus {
    /// The child's inventory now matches the propagated quantity.
    Updated,
    /// The update call failed; later children were still attempted.
    Failed {
        /// Human-readable failure reason.
        message: String,
    },
}

/// Result for a single child, in fan-out order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildOutcome {
    /// The child product.
    pub product_id: ProductId,
    /// What happened.
    #[serde(flatten)]
    pub status: ChildStatus,
}

/// Overall result of a propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Every child was updated (including the zero-children case).
    Complete,
    /// Some children were updated, some failed.
    Partial,
    /// Every child failed.
    Failed,
}

/// Per-child report of one `SyncInventory` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// The master the quantity was propagated from.
    pub master_product_id: ProductId,
    /// The quantity set on every child.
    pub inventory_quantity: InventoryQuantity,
    /// One entry per child, in stored order.
    pub outcomes: Vec<ChildOutcome>,
}

impl SyncReport {
    /// Start an empty report.
    #[must_use]
    pub fn new(master_product_id: ProductId, inventory_quantity: InventoryQuantity) -> Self {
        Self {
            master_product_id,
            inventory_quantity,
            outcomes: Vec::new(),
        }
    }

    /// Record a successful child update.
    pub fn record_updated(&mut self, product_id: ProductId) {
        self.outcomes.push(ChildOutcome {
            product_id,
            status: ChildStatus::Updated,
        });
    }

    /// Record a failed child update.
    pub fn record_failed(&mut self, product_id: ProductId, message: impl Into<String>) {
        self.outcomes.push(ChildOutcome {
            product_id,
            status: ChildStatus::Failed {
                message: message.into(),
            },
        });
    }

    /// Number of children updated.
    #[must_use]
    pub fn updated_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == ChildStatus::Updated)
            .count()
    }

    /// Number of children that failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.updated_count()
    }

    /// Children that failed, in fan-out order.
    #[must_use]
    pub fn failed_products(&self) -> Vec<&ProductId> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ChildStatus::Failed { .. }))
            .map(|o| &o.product_id)
            .collect()
    }

    /// Overall status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        match (self.updated_count(), self.failed_count()) {
            (_, 0) => SyncStatus::Complete,
            (0, _) => SyncStatus::Failed,
            _ => SyncStatus::Partial,
        }
    }
}
