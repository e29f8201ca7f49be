//! In-memory BOM Repository
//!
//! Implements `BomRepository` over process memory. Each session stages the
//! BOMs it writes on private copies; `commit` publishes those BOMs only, so
//! sessions committing different BOMs never overwrite each other. Used by
//! the test suites.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use bomsync_models::{Bom, BomItem, BomOperation, BomSummary, ErrorLogEntry, Item};

use super::{BomFilter, BomRepository, InsertOptions, VariantFilter};

#[derive(Debug, Clone, Default)]
struct Store {
    items: BTreeMap<String, Item>,
    boms: BTreeMap<String, Bom>,
}

/// One session over a shared in-memory store.
///
/// `session()` opens another session over the same committed data with its
/// own pending unit of work.
#[derive(Debug, Default)]
pub struct InMemoryBomRepository {
    committed: Arc<RwLock<Store>>,
    error_log: Arc<RwLock<Vec<ErrorLogEntry>>>,
    failing_boms: Arc<RwLock<HashSet<String>>>,
    /// BOMs written by this session and not yet committed
    pending: RwLock<BTreeMap<String, Bom>>,
}

impl InMemoryBomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new session sharing committed data, error log and fault settings
    pub fn session(&self) -> Self {
        Self {
            committed: Arc::clone(&self.committed),
            error_log: Arc::clone(&self.error_log),
            failing_boms: Arc::clone(&self.failing_boms),
            pending: RwLock::new(BTreeMap::new()),
        }
    }

    /// Seeds an item directly into committed state
    pub async fn put_item(&self, item: Item) {
        self.committed
            .write()
            .await
            .items
            .insert(item.item_code.clone(), item);
    }

    /// Seeds a BOM directly into committed state
    pub async fn put_bom(&self, bom: Bom) {
        self.committed.write().await.boms.insert(bom.name.clone(), bom);
    }

    /// Committed copy of a BOM, ignoring anything pending in this session
    pub async fn committed_bom(&self, name: &str) -> Option<Bom> {
        self.committed.read().await.boms.get(name).cloned()
    }

    pub async fn has_pending_changes(&self) -> bool {
        !self.pending.read().await.is_empty()
    }

    pub async fn error_log(&self) -> Vec<ErrorLogEntry> {
        self.error_log.read().await.clone()
    }

    /// Makes every child-row insert into `bom` fail, for fault isolation tests
    pub async fn fail_writes_for(&self, bom: impl Into<String>) {
        self.failing_boms.write().await.insert(bom.into());
    }

    /// The BOM as this session sees it: staged copy first, then committed
    async fn bom(&self, name: &str) -> Option<Bom> {
        if let Some(staged) = self.pending.read().await.get(name) {
            return Some(staged.clone());
        }
        self.committed_bom(name).await
    }

    /// Applies `f` to this session's staged copy of `name`
    async fn write_bom<T>(&self, name: &str, f: impl FnOnce(&mut Bom) -> Result<T>) -> Result<T> {
        let mut pending = self.pending.write().await;
        if !pending.contains_key(name) {
            let bom = self
                .committed_bom(name)
                .await
                .ok_or_else(|| anyhow!("BOM {} not found", name))?;
            pending.insert(name.to_string(), bom);
        }
        let staged = pending
            .get_mut(name)
            .context("in-memory unit of work was not opened")?;
        f(staged)
    }

    async fn check_failure(&self, bom: &str) -> Result<()> {
        if self.failing_boms.read().await.contains(bom) {
            bail!("simulated write failure for BOM {}", bom);
        }
        Ok(())
    }
}

#[async_trait]
impl BomRepository for InMemoryBomRepository {
    async fn find_item(&self, item_code: &str) -> Result<Option<Item>> {
        Ok(self.committed.read().await.items.get(item_code).cloned())
    }

    async fn find_variants(&self, filter: &VariantFilter) -> Result<Vec<Item>> {
        Ok(self
            .committed
            .read()
            .await
            .items
            .values()
            .filter(|item| item.variant_of.as_deref() == Some(filter.template.as_str()))
            .filter(|item| !filter.enabled_only || !item.disabled)
            .cloned()
            .collect())
    }

    async fn find_boms(&self, filter: &BomFilter) -> Result<Vec<BomSummary>> {
        let pending = self.pending.read().await;
        let committed = self.committed.read().await;

        let mut visible: BTreeMap<&str, &Bom> = committed
            .boms
            .iter()
            .map(|(name, bom)| (name.as_str(), bom))
            .collect();
        visible.extend(pending.iter().map(|(name, bom)| (name.as_str(), bom)));

        Ok(visible
            .into_values()
            .map(Bom::summary)
            .filter(|summary| filter.matches(summary))
            .collect())
    }

    async fn find_bom(&self, name: &str) -> Result<Option<Bom>> {
        Ok(self.bom(name).await)
    }

    async fn find_bom_items(&self, bom: &str) -> Result<Vec<BomItem>> {
        let mut items = self.bom(bom).await.map(|b| b.items).unwrap_or_default();
        items.sort_by_key(|i| i.idx);
        Ok(items)
    }

    async fn find_bom_operations(&self, bom: &str) -> Result<Vec<BomOperation>> {
        let mut ops = self.bom(bom).await.map(|b| b.operations).unwrap_or_default();
        ops.sort_by_key(|o| o.idx);
        Ok(ops)
    }

    async fn delete_bom_items(&self, bom: &str) -> Result<u64> {
        if self.bom(bom).await.is_none() {
            return Ok(0);
        }
        self.write_bom(bom, |b| Ok(b.items.drain(..).count() as u64)).await
    }

    async fn delete_bom_operations(&self, bom: &str) -> Result<u64> {
        if self.bom(bom).await.is_none() {
            return Ok(0);
        }
        self.write_bom(bom, |b| Ok(b.operations.drain(..).count() as u64)).await
    }

    async fn insert_bom_item(&self, bom: &str, item: &BomItem, options: InsertOptions) -> Result<()> {
        self.check_failure(bom).await?;

        if !options.ignore_mandatory && (item.item_code.is_empty() || item.uom.is_none()) {
            bail!("Mandatory fields missing on BOM item in {}", bom);
        }
        if !options.ignore_links && !self.committed.read().await.items.contains_key(&item.item_code) {
            bail!("Could not find Item: {}", item.item_code);
        }

        self.write_bom(bom, |target| {
            if target.items.contains(item) {
                if options.ignore_if_duplicate {
                    return Ok(());
                }
                bail!("Duplicate BOM item {} in {}", item.item_code, bom);
            }
            target.items.push(item.clone());
            Ok(())
        })
        .await
    }

    async fn insert_bom_operation(
        &self,
        bom: &str,
        operation: &BomOperation,
        options: InsertOptions,
    ) -> Result<()> {
        self.check_failure(bom).await?;

        if !options.ignore_mandatory && operation.operation.is_empty() {
            bail!("Mandatory fields missing on BOM operation in {}", bom);
        }

        self.write_bom(bom, |target| {
            if target.operations.contains(operation) {
                if options.ignore_if_duplicate {
                    return Ok(());
                }
                bail!("Duplicate BOM operation {} in {}", operation.operation, bom);
            }
            target.operations.push(operation.clone());
            Ok(())
        })
        .await
    }

    async fn set_bom_routing(&self, bom: &str, routing: Option<&str>) -> Result<()> {
        self.write_bom(bom, |b| {
            b.routing = routing.map(str::to_string);
            Ok(())
        })
        .await
    }

    async fn touch_bom_modified(&self, bom: &str, at: DateTime<Utc>) -> Result<()> {
        self.write_bom(bom, |b| {
            b.modified = at;
            Ok(())
        })
        .await
    }

    async fn record_error(&self, title: &str, message: &str) -> Result<()> {
        let mut log = self.error_log.write().await;
        let id = log.len() as i64 + 1;
        log.push(ErrorLogEntry {
            id,
            title: title.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let staged = std::mem::take(&mut *self.pending.write().await);
        if staged.is_empty() {
            return Ok(());
        }

        let mut committed = self.committed.write().await;
        for (name, bom) in staged {
            committed.boms.insert(name, bom);
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.pending.write().await.clear();
        Ok(())
    }
}
