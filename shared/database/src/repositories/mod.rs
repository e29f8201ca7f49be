//! Repository module for BOM storage access
//!
//! `BomRepository` is the capability set the variant synchronizer needs:
//! filtered queries, filtered deletes, inserts, single-field updates and
//! explicit transaction control. Writes made through one repository value
//! form a unit of work that `commit` persists and `rollback` discards.

pub mod bom;
pub mod memory;

pub use bom::PgBomRepository;
pub use memory::InMemoryBomRepository;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bomsync_models::{Bom, BomItem, BomOperation, BomSummary, Item};

/// Selects the variants of a template item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantFilter {
    pub template: String,
    pub enabled_only: bool,
}

/// Selects BOM headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BomFilter {
    pub items: Vec<String>,
    pub active_only: bool,
    pub exclude_cancelled: bool,
    pub exclude_name: Option<String>,
}

/// Validation the store may skip when inserting a child row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOptions {
    /// Skip checking that referenced items exist.
    pub ignore_links: bool,
    /// Silently drop a row that collides with an existing one.
    pub ignore_if_duplicate: bool,
    /// Skip required-field checks.
    pub ignore_mandatory: bool,
}

impl InsertOptions {
    /// Every check enabled
    pub fn checked() -> Self {
        Self {
            ignore_links: false,
            ignore_if_duplicate: false,
            ignore_mandatory: false,
        }
    }

    /// Every check suppressed
    pub fn unchecked() -> Self {
        Self {
            ignore_links: true,
            ignore_if_duplicate: true,
            ignore_mandatory: true,
        }
    }
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self::checked()
    }
}

impl VariantFilter {
    pub fn of(template: impl Into<String>, enabled_only: bool) -> Self {
        Self {
            template: template.into(),
            enabled_only,
        }
    }
}

impl BomFilter {
    /// Active, non-cancelled BOMs of `items`, excluding `exclude_name`
    pub fn eligible_for(items: Vec<String>, exclude_name: impl Into<String>) -> Self {
        Self {
            items,
            active_only: true,
            exclude_cancelled: true,
            exclude_name: Some(exclude_name.into()),
        }
    }

    pub fn matches(&self, bom: &BomSummary) -> bool {
        self.items.iter().any(|item| item == &bom.item)
            && (!self.active_only || bom.is_active)
            && (!self.exclude_cancelled || bom.docstatus != bomsync_models::DocStatus::Cancelled)
            && self.exclude_name.as_deref() != Some(bom.name.as_str())
    }
}

#[async_trait]
pub trait BomRepository: Send + Sync {
    /// Item with its variant attributes
    async fn find_item(&self, item_code: &str) -> Result<Option<Item>>;

    /// Variants of a template, ordered by item code
    async fn find_variants(&self, filter: &VariantFilter) -> Result<Vec<Item>>;

    /// BOM headers matching the filter, ordered by name
    async fn find_boms(&self, filter: &BomFilter) -> Result<Vec<BomSummary>>;

    /// Full BOM document including child tables
    async fn find_bom(&self, name: &str) -> Result<Option<Bom>>;

    /// Lines of a BOM ordered by idx
    async fn find_bom_items(&self, bom: &str) -> Result<Vec<BomItem>>;

    /// Operations of a BOM ordered by idx
    async fn find_bom_operations(&self, bom: &str) -> Result<Vec<BomOperation>>;

    /// Removes every line of a BOM, returning the number removed
    async fn delete_bom_items(&self, bom: &str) -> Result<u64>;

    /// Removes every operation of a BOM, returning the number removed
    async fn delete_bom_operations(&self, bom: &str) -> Result<u64>;

    async fn insert_bom_item(&self, bom: &str, item: &BomItem, options: InsertOptions) -> Result<()>;

    async fn insert_bom_operation(
        &self,
        bom: &str,
        operation: &BomOperation,
        options: InsertOptions,
    ) -> Result<()>;

    async fn set_bom_routing(&self, bom: &str, routing: Option<&str>) -> Result<()>;

    async fn touch_bom_modified(&self, bom: &str, at: DateTime<Utc>) -> Result<()>;

    /// Persists a diagnostic entry. Not part of the unit of work: survives rollback.
    async fn record_error(&self, title: &str, message: &str) -> Result<()>;

    async fn commit(&self) -> Result<()>;

    async fn rollback(&self) -> Result<()>;
}
