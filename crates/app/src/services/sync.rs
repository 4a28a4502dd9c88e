//! Sync-master propagation engine.
//!
//! Linkage state lives in product metafields under the store's namespace:
//!
//! | Key | Product | Type |
//! |-----|---------|------|
//! | `is_sync_master` | master | `boolean` |
//! | `linked_products` | master | `list.product_reference` (ordered) |
//! | `linked_master` | child | `product_reference` |
//! | `sync_state` | master | `json` ([`SyncState`]) |
//!
//! The `linked_master` back-reference lets "a child cannot become a master"
//! be checked by reading the candidate alone. Writes are ordered so that a
//! child listed in `linked_products` always carries its back-reference, even
//! if a later write fails.

use chrono::Utc;
use stock_sync_core::{
    InventoryQuantity, LinkageError, LinkageField, Namespace, ProductId, ProductLinkage,
    SyncReport, SyncState,
};
use thiserror::Error;
use tracing::instrument;

use crate::shopify::{CommercePlatform, DefinitionOutcome, Metafield, RetryPolicy, ShopifyError};

use super::store_sessions::StoreSession;

/// Errors raised by the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The request itself is malformed (empty, duplicate or self-referencing children).
    #[error(transparent)]
    Validation(#[from] LinkageError),

    /// A linked child cannot be designated master.
    #[error("product {0} is linked to a sync master and cannot become one")]
    ChildCannotBeMaster(ProductId),

    /// Linking requires a designated master.
    #[error("product {0} is not a sync master")]
    NotMaster(ProductId),

    /// A master cannot be linked as a child.
    #[error("product {0} is a sync master and cannot be linked as a child")]
    MasterCannotBeChild(ProductId),

    /// A child belongs to at most one master.
    #[error("product {child} is already linked to sync master {master}")]
    AlreadyLinked {
        /// The contested child.
        child: ProductId,
        /// Its current master.
        master: ProductId,
    },

    /// The master has no linkage.
    #[error("no linked products found for product {0}")]
    NoLinkage(ProductId),

    /// A stored metafield could not be interpreted.
    #[error("metafield {key} on product {product} is malformed: {reason}")]
    CorruptMetafield {
        /// Product carrying the metafield.
        product: ProductId,
        /// Metafield key.
        key: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The platform call failed.
    #[error(transparent)]
    Upstream(#[from] ShopifyError),
}

/// Result of `DesignateMaster`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Designation {
    /// `is_sync_master` was written.
    Designated,
    /// The product was already a master; nothing was written.
    AlreadyMaster,
}

impl Designation {
    /// Whether a write happened.
    #[must_use]
    pub const fn wrote(self) -> bool {
        matches!(self, Self::Designated)
    }
}

/// Result of `CheckAndEnsureMetafieldSchema`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    /// Definitions created by this run.
    pub created: Vec<LinkageField>,
    /// Definitions that already existed.
    pub existing: Vec<LinkageField>,
}

impl SchemaReport {
    /// Whether every definition is now present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.created.len() + self.existing.len() == LinkageField::ALL.len()
    }
}

/// A metafield value and the id needed to delete it.
#[derive(Debug, Clone)]
struct Stored<T> {
    id: u64,
    value: T,
}

/// Linkage metafields of one product.
#[derive(Debug, Default)]
struct ProductFields {
    is_sync_master: bool,
    linked_products: Option<Vec<ProductId>>,
    linked_master: Option<Stored<ProductId>>,
    sync_state: Option<SyncState>,
}

impl ProductFields {
    fn parse(product: &ProductId, metafields: Vec<Metafield>) -> Result<Self, SyncError> {
        let corrupt = |field: LinkageField, reason: String| SyncError::CorruptMetafield {
            product: product.clone(),
            key: field.key(),
            reason,
        };

        let mut fields = Self::default();
        for metafield in metafields {
            let Some(field) = LinkageField::from_key(&metafield.key) else {
                continue;
            };
            match field {
                LinkageField::IsSyncMaster => {
                    fields.is_sync_master = match metafield.value.trim() {
                        "true" => true,
                        "false" | "" => false,
                        other => return Err(corrupt(field, format!("not a boolean: {other}"))),
                    };
                }
                LinkageField::LinkedProducts => {
                    let children: Vec<ProductId> = serde_json::from_str(&metafield.value)
                        .map_err(|e| corrupt(field, e.to_string()))?;
                    fields.linked_products = Some(children);
                }
                LinkageField::LinkedMaster => {
                    let master = ProductId::parse(&metafield.value)
                        .map_err(|e| corrupt(field, e.to_string()))?;
                    fields.linked_master = Some(Stored {
                        id: metafield.id,
                        value: master,
                    });
                }
                LinkageField::SyncState => {
                    let state: SyncState = serde_json::from_str(&metafield.value)
                        .map_err(|e| corrupt(field, e.to_string()))?;
                    fields.sync_state = Some(state);
                }
            }
        }

        Ok(fields)
    }
}

fn encode_children(children: &[ProductId]) -> Result<String, SyncError> {
    let gids: Vec<String> = children.iter().map(ProductId::gid).collect();
    serde_json::to_string(&gids).map_err(|e| SyncError::Upstream(ShopifyError::Parse(e)))
}

fn encode_state(state: &SyncState) -> Result<String, SyncError> {
    serde_json::to_string(state).map_err(|e| SyncError::Upstream(ShopifyError::Parse(e)))
}

/// Runs linkage operations for one store.
pub struct SyncEngine<'a> {
    platform: &'a dyn CommercePlatform,
    namespace: &'a Namespace,
    retry: RetryPolicy,
}

impl<'a> SyncEngine<'a> {
    /// Create an engine over `platform`, scoped to `namespace`.
    #[must_use]
    pub fn new(platform: &'a dyn CommercePlatform, namespace: &'a Namespace) -> Self {
        Self {
            platform,
            namespace,
            retry: RetryPolicy::default(),
        }
    }

    /// Create an engine for a resolved store session.
    #[must_use]
    pub fn for_session(session: &'a StoreSession) -> Self {
        Self::new(session.platform(), session.namespace())
    }

    /// Use `retry` for metafield definition calls.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fields(&self, product: &ProductId) -> Result<ProductFields, SyncError> {
        let metafields = self
            .platform
            .product_metafields(product, self.namespace)
            .await?;
        ProductFields::parse(product, metafields)
    }

    async fn write(
        &self,
        product: &ProductId,
        field: LinkageField,
        value: String,
    ) -> Result<(), SyncError> {
        self.platform
            .set_product_metafield(product, self.namespace, field, value)
            .await?;
        Ok(())
    }

    /// Mark `product` as a sync master.
    ///
    /// Idempotent: a product that is already a master is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::ChildCannotBeMaster` if the product is linked to a
    /// master, or `SyncError::Upstream` if a platform call fails.
    #[instrument(skip(self), fields(namespace = %self.namespace, product_id = %product))]
    pub async fn designate_master(&self, product: &ProductId) -> Result<Designation, SyncError> {
        let fields = self.fields(product).await?;

        if fields.linked_master.is_some() {
            return Err(SyncError::ChildCannotBeMaster(product.clone()));
        }

        if fields.is_sync_master {
            tracing::debug!("Product is already a sync master");
            return Ok(Designation::AlreadyMaster);
        }

        self.write(product, LinkageField::IsSyncMaster, "true".to_string())
            .await?;

        tracing::info!("Product designated as sync master");
        Ok(Designation::Designated)
    }

    /// Replace the children of `master` with `children`.
    ///
    /// Every check runs before the first write. Writes happen in this order:
    /// back-references on new children, the master's child list, the bumped
    /// `sync_state`, then removal of back-references from released children.
    /// A failed write aborts the operation; earlier writes are kept.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` for an empty, duplicated or
    /// self-referencing child list, an invalid-state error when a product has
    /// the wrong role, or `SyncError::Upstream` if a platform call fails.
    #[instrument(skip(self, children), fields(namespace = %self.namespace, product_id = %master, children = children.len()))]
    pub async fn link_children(
        &self,
        master: &ProductId,
        children: Vec<ProductId>,
    ) -> Result<ProductLinkage, SyncError> {
        let requested = ProductLinkage::requested(master.clone(), children, SyncState::default())?;

        let master_fields = self.fields(master).await?;
        if !master_fields.is_sync_master {
            return Err(SyncError::NotMaster(master.clone()));
        }

        let mut needs_back_reference = Vec::new();
        for child in requested.children() {
            let child_fields = self.fields(child).await?;
            if child_fields.is_sync_master {
                return Err(SyncError::MasterCannotBeChild(child.clone()));
            }
            match child_fields.linked_master {
                Some(current) if current.value == *master => {}
                Some(current) => {
                    return Err(SyncError::AlreadyLinked {
                        child: child.clone(),
                        master: current.value,
                    });
                }
                None => needs_back_reference.push(child.clone()),
            }
        }

        let previous = master_fields.linked_products.unwrap_or_default();
        let released = requested.released_from(&previous);
        let mut stale_back_references = Vec::new();
        for child in &released {
            if let Some(back_reference) = self.fields(child).await?.linked_master
                && back_reference.value == *master
            {
                stale_back_references.push(back_reference.id);
            }
        }

        let state = master_fields
            .sync_state
            .unwrap_or_default()
            .relinked(Utc::now());

        for child in &needs_back_reference {
            self.write(child, LinkageField::LinkedMaster, master.gid())
                .await?;
        }

        self.write(
            master,
            LinkageField::LinkedProducts,
            encode_children(requested.children())?,
        )
        .await?;
        self.write(master, LinkageField::SyncState, encode_state(&state)?)
            .await?;

        for metafield_id in stale_back_references {
            self.platform.delete_metafield(metafield_id).await?;
        }

        tracing::info!(
            version = state.version,
            linked = needs_back_reference.len(),
            released = released.len(),
            "Linked products updated"
        );

        Ok(requested.with_state(state))
    }

    /// Read the linkage of `master`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NoLinkage` if the master has no child list, or
    /// `SyncError::CorruptMetafield` if the stored list is invalid.
    #[instrument(skip(self), fields(namespace = %self.namespace, product_id = %master))]
    pub async fn linkage(&self, master: &ProductId) -> Result<ProductLinkage, SyncError> {
        let fields = self.fields(master).await?;
        let children = fields
            .linked_products
            .ok_or_else(|| SyncError::NoLinkage(master.clone()))?;

        ProductLinkage::new(master.clone(), children, fields.sync_state.unwrap_or_default())
            .map_err(|e| SyncError::CorruptMetafield {
                product: master.clone(),
                key: LinkageField::LinkedProducts.key(),
                reason: e.to_string(),
            })
    }

    /// Set every child of `master` to `quantity`.
    ///
    /// Children are updated one at a time in stored order. A failing child is
    /// recorded and the rest are still attempted; nothing is rolled back. The
    /// master itself is never updated.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NoLinkage` if the master has no linkage, or
    /// `SyncError::Upstream` if the linkage cannot be read. Per-child failures
    /// are reported in the returned [`SyncReport`], not as errors.
    #[instrument(skip(self), fields(namespace = %self.namespace, product_id = %master, quantity = quantity.get()))]
    pub async fn sync_inventory(
        &self,
        master: &ProductId,
        quantity: InventoryQuantity,
    ) -> Result<SyncReport, SyncError> {
        let linkage = self.linkage(master).await?;
        let mut report = SyncReport::new(master.clone(), quantity);

        for child in linkage.children() {
            match self.platform.set_product_inventory(child, quantity).await {
                Ok(()) => {
                    tracing::debug!(child = %child, "Child inventory updated");
                    report.record_updated(child.clone());
                }
                Err(e) => {
                    tracing::warn!(child = %child, error = %e, "Child inventory update failed");
                    report.record_failed(child.clone(), e.to_string());
                }
            }
        }

        let state = linkage.state().synced(quantity.get(), Utc::now());
        let recorded = match encode_state(&state) {
            Ok(value) => self.write(master, LinkageField::SyncState, value).await,
            Err(e) => Err(e),
        };
        if let Err(e) = recorded {
            tracing::warn!(error = %e, "Failed to record sync state");
        }

        tracing::info!(
            updated = report.updated_count(),
            failed = report.failed_count(),
            "Inventory propagated"
        );

        Ok(report)
    }

    /// Create any missing linkage metafield definitions.
    ///
    /// Definition calls are retried on rate limiting per the engine's
    /// [`RetryPolicy`].
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Upstream` if a call fails, including
    /// `ShopifyError::RateLimited` once the retry budget is spent.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn ensure_schema(&self) -> Result<SchemaReport, SyncError> {
        let definitions = self
            .retry
            .run(|| self.platform.metafield_definitions(self.namespace))
            .await?;

        let mut report = SchemaReport::default();
        for field in LinkageField::ALL {
            let present = definitions
                .iter()
                .any(|d| d.namespace == self.namespace.as_str() && d.key == field.key());
            if present {
                report.existing.push(field);
                continue;
            }

            let outcome = self
                .retry
                .run(|| {
                    self.platform
                        .create_metafield_definition(self.namespace, field)
                })
                .await?;

            match outcome {
                DefinitionOutcome::Created => {
                    tracing::info!(key = field.key(), "Metafield definition created");
                    report.created.push(field);
                }
                DefinitionOutcome::AlreadyExists => report.existing.push(field),
            }
        }

        Ok(report)
    }
}
