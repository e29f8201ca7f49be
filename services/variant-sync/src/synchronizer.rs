//! Variant BOM Synchronizer
//!
//! Pushes the lines, operations and routing of a template BOM into the
//! BOMs of every variant of the template item. Each variant BOM is its own
//! unit of work: a failure rolls back that BOM only and the run continues.
//! Quantity and rate of lines whose item code carries over are preserved.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use bomsync_database::{BomFilter, BomRepository, InsertOptions, VariantFilter};
use bomsync_models::{Bom, BomItem, BomSummary, Item};
use bomsync_utils::{
    find_matching_variant, log_error, log_warn, validate_template_document, BomSyncError,
    BomSyncResult, BomValidator, MatchKey, NoVariantsPolicy, SyncConfig,
};

use crate::report::{BomFailure, SkippedVariant, SyncOutcome};

pub const SYNC_ERROR_TITLE: &str = "Sync Variant BOMs";
pub const MISSING_VARIANTS_TITLE: &str = "Missing Variant Items";
pub const SYNC_ERRORS_TITLE: &str = "Errors in Syncing Variant BOMs";
pub const NO_VARIANTS_TITLE: &str = "No Variant Items";
pub const SKIPPED_VARIANTS_TITLE: &str = "Variants Skipped";

pub const NOT_TEMPLATE_MESSAGE: &str = "This BOM is not a template with variants.";
pub const NO_VARIANTS_MESSAGE: &str = "No variant items found for this template.";
pub const NO_VARIANT_BOMS_MESSAGE: &str = "No active variant BOMs found for this template's variants.";
pub const SUCCESS_MESSAGE: &str = "Successfully updated all variant BOMs.";

/// Document lifecycle events the host reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    Validate,
    BeforeSave,
    OnUpdate,
    BeforeSubmit,
    OnSubmit,
    OnCancel,
}

/// Qty and rate of an existing variant line, keyed by item code.
type Snapshot = HashMap<String, (f64, f64)>;

/// One variant and the BOMs of it that will be rewritten.
struct Target {
    variant: Item,
    key: Option<MatchKey>,
    boms: Vec<BomSummary>,
}

pub struct VariantBomSynchronizer<'a, R: BomRepository + ?Sized> {
    repo: &'a R,
    config: &'a SyncConfig,
}

impl<'a, R: BomRepository + ?Sized> VariantBomSynchronizer<'a, R> {
    pub fn new(repo: &'a R, config: &'a SyncConfig) -> Self {
        Self { repo, config }
    }

    /// Lifecycle entry point. Only `BeforeSave` triggers a sync.
    pub async fn on_bom_event(&self, doc: &Bom, event: HookEvent) -> BomSyncResult<SyncOutcome> {
        if event != HookEvent::BeforeSave {
            debug!(bom = %doc.name, ?event, "Ignoring BOM event");
            return Ok(SyncOutcome::new(&doc.name));
        }

        self.sync_template(doc).await
    }

    /// Re-runs the sync for a template BOM already in storage
    pub async fn sync_stored_template(&self, name: &str) -> BomSyncResult<SyncOutcome> {
        let doc = self
            .repo
            .find_bom(name)
            .await?
            .ok_or_else(|| BomSyncError::not_found(format!("BOM {}", name)))?;

        self.sync_template(&doc).await
    }

    pub async fn sync_template(&self, doc: &Bom) -> BomSyncResult<SyncOutcome> {
        info!(
            template = %doc.name,
            item = %doc.item,
            profile = ?self.config.profile,
            "Variant BOM sync started"
        );

        let mut outcome = SyncOutcome::new(&doc.name);

        let is_template = self
            .repo
            .find_item(&doc.item)
            .await?
            .map_or(false, |item| item.has_variants);
        if !is_template {
            debug!(item = %doc.item, "Item has no variants, nothing to sync");
            if self.config.announce_skips {
                outcome.info(NOT_TEMPLATE_MESSAGE);
            }
            return Ok(outcome);
        }

        // Only template documents feed writes, so only they are checked
        validate_template_document(doc)?;

        let lint = BomValidator::new().validate(doc);
        for issue in &lint.issues {
            log_warn!(SYNC_ERROR_TITLE, template = %doc.name, "Template lint: {}", issue.message);
        }

        let variants = self
            .repo
            .find_variants(&VariantFilter::of(&doc.item, self.config.enabled_variants_only))
            .await?;

        if variants.is_empty() {
            return match self.config.no_variants {
                NoVariantsPolicy::Warn => {
                    outcome.info(NO_VARIANTS_MESSAGE);
                    Ok(outcome)
                }
                NoVariantsPolicy::Block => Err(BomSyncError::blocked(
                    NO_VARIANTS_TITLE,
                    vec![format!("No enabled variant items found for template item {}", doc.item)],
                )),
            };
        }

        let targets = self.collect_targets(doc, variants, &mut outcome).await?;

        if !outcome.skipped_variants.is_empty() {
            let lines: Vec<String> = outcome
                .skipped_variants
                .iter()
                .map(|s| format!("Skipped variant {}: {}", s.item_code, s.reason))
                .collect();
            outcome.warning(SKIPPED_VARIANTS_TITLE, &lines);
        }

        if targets.iter().all(|t| t.boms.is_empty()) {
            outcome.info(NO_VARIANT_BOMS_MESSAGE);
            return Ok(outcome);
        }

        let mut resolver = LineResolver::new(self.repo, self.config);
        let mut missing = Vec::new();

        for target in &targets {
            for bom in &target.boms {
                match self.reconcile(doc, target, bom, &mut resolver).await {
                    Ok(unresolved) => {
                        info!(bom = %bom.name, variant = %target.variant.item_code, "Variant BOM synced");
                        missing.extend(unresolved);
                        outcome.synced.push(bom.name.clone());
                    }
                    Err(e) => {
                        self.contain_failure(bom, &e).await;
                        outcome.failed.push(BomFailure {
                            bom: bom.name.clone(),
                            error: format!("{:#}", e),
                        });
                    }
                }
            }
        }

        info!(
            template = %doc.name,
            synced = outcome.synced.len(),
            failed = outcome.failed.len(),
            unresolved = missing.len(),
            "Variant BOM sync finished"
        );

        if !missing.is_empty() {
            return Err(BomSyncError::blocked(MISSING_VARIANTS_TITLE, missing));
        }

        if outcome.failed.is_empty() {
            outcome.info(SUCCESS_MESSAGE);
        } else {
            let lines: Vec<String> = outcome
                .failed
                .iter()
                .map(|f| format!("Failed to update Variant BOM {}: {}", f.bom, f.error))
                .collect();
            outcome.warning(SYNC_ERRORS_TITLE, &lines);
        }

        Ok(outcome)
    }

    async fn collect_targets(
        &self,
        doc: &Bom,
        variants: Vec<Item>,
        outcome: &mut SyncOutcome,
    ) -> BomSyncResult<Vec<Target>> {
        let mut targets = Vec::with_capacity(variants.len());

        for variant in variants {
            let key = if self.config.resolves_variants() {
                match MatchKey::for_item(&variant, &self.config.matching_attributes) {
                    Ok(key) => Some(key),
                    Err(missing) => {
                        log_warn!(SYNC_ERROR_TITLE, variant = %variant.item_code, "Skipping variant: {}", missing);
                        outcome.skipped_variants.push(SkippedVariant {
                            item_code: variant.item_code.clone(),
                            reason: missing.to_string(),
                        });
                        continue;
                    }
                }
            } else {
                None
            };

            let boms = self
                .repo
                .find_boms(&BomFilter::eligible_for(
                    vec![variant.item_code.clone()],
                    doc.name.clone(),
                ))
                .await?;

            targets.push(Target { variant, key, boms });
        }

        Ok(targets)
    }

    /// Rewrites one variant BOM and commits it. Returns the template lines
    /// that could not be matched to a variant of their item.
    async fn reconcile(
        &self,
        doc: &Bom,
        target: &Target,
        bom: &BomSummary,
        resolver: &mut LineResolver<'a, R>,
    ) -> anyhow::Result<Vec<String>> {
        let snapshot: Snapshot = self
            .repo
            .find_bom_items(&bom.name)
            .await?
            .into_iter()
            .map(|line| (line.item_code, (line.qty, line.rate)))
            .collect();

        self.repo.delete_bom_items(&bom.name).await?;
        self.repo.delete_bom_operations(&bom.name).await?;

        let mut unresolved = Vec::new();

        for template_line in &doc.items {
            let line = match resolver.resolve(template_line, target.key.as_ref()).await? {
                Resolution::Keep => carry_over(template_line, None, &snapshot),
                Resolution::Substitute(variant) => carry_over(template_line, Some(&variant), &snapshot),
                Resolution::Missing(key) => {
                    unresolved.push(format!(
                        "Row {}: no variant of {} with {} for {} (BOM {})",
                        template_line.idx,
                        template_line.item_code,
                        key,
                        target.variant.item_code,
                        bom.name
                    ));
                    continue;
                }
            };

            self.repo
                .insert_bom_item(&bom.name, &line, InsertOptions::unchecked())
                .await?;
        }

        for operation in &doc.operations {
            self.repo
                .insert_bom_operation(&bom.name, operation, InsertOptions::unchecked())
                .await?;
        }

        if self.config.sync_routing {
            self.repo
                .set_bom_routing(&bom.name, doc.routing.as_deref())
                .await?;
        }

        if bom.is_submitted() {
            self.repo.touch_bom_modified(&bom.name, Utc::now()).await?;
        }

        self.repo.commit().await?;
        Ok(unresolved)
    }

    async fn contain_failure(&self, bom: &BomSummary, error: &anyhow::Error) {
        log_error!(SYNC_ERROR_TITLE, format!("{:#}", error), bom = %bom.name, "Error updating Variant BOM");

        if let Err(rollback_err) = self.repo.rollback().await {
            log_error!(SYNC_ERROR_TITLE, format!("{:#}", rollback_err), bom = %bom.name, "Rollback failed");
        }

        let message = format!("Error updating Variant BOM {}: {:#}", bom.name, error);
        if let Err(log_err) = self.repo.record_error(SYNC_ERROR_TITLE, &message).await {
            log_error!(SYNC_ERROR_TITLE, format!("{:#}", log_err), "Could not persist error log entry");
        }
    }
}

/// Copies a template line for a variant BOM. Qty and rate come from the
/// variant's previous lines when the (possibly substituted) code was there.
fn carry_over(template_line: &BomItem, substitute: Option<&Item>, snapshot: &Snapshot) -> BomItem {
    let mut line = template_line.clone();

    if let Some(variant) = substitute {
        line.item_code = variant.item_code.clone();
        line.item_name = variant.item_name.clone();
        line.has_variants = false;
        // the template line points at the sub-template's BOM
        line.bom_no = None;
    }

    if let Some(&(qty, rate)) = snapshot.get(&line.item_code) {
        line.qty = qty;
        line.rate = rate;
    }

    line
}

enum Resolution {
    Keep,
    Substitute(Item),
    Missing(MatchKey),
}

/// Resolves template lines to variant-specific items, caching lookups for
/// the whole run.
struct LineResolver<'a, R: BomRepository + ?Sized> {
    repo: &'a R,
    config: &'a SyncConfig,
    has_variants: HashMap<String, bool>,
    variants: HashMap<String, Vec<Item>>,
}

impl<'a, R: BomRepository + ?Sized> LineResolver<'a, R> {
    fn new(repo: &'a R, config: &'a SyncConfig) -> Self {
        Self {
            repo,
            config,
            has_variants: HashMap::new(),
            variants: HashMap::new(),
        }
    }

    async fn resolve(&mut self, line: &BomItem, key: Option<&MatchKey>) -> anyhow::Result<Resolution> {
        let Some(key) = key else {
            return Ok(Resolution::Keep);
        };

        if !self.item_has_variants(line).await? {
            return Ok(Resolution::Keep);
        }

        let candidates = self.variants_of(&line.item_code).await?;
        Ok(match find_matching_variant(candidates, key) {
            Some(variant) => Resolution::Substitute(variant.clone()),
            None => Resolution::Missing(key.clone()),
        })
    }

    async fn item_has_variants(&mut self, line: &BomItem) -> anyhow::Result<bool> {
        if let Some(&known) = self.has_variants.get(&line.item_code) {
            return Ok(known);
        }

        // Unknown items fall back to the flag carried on the line
        let has_variants = self
            .repo
            .find_item(&line.item_code)
            .await?
            .map_or(line.has_variants, |item| item.has_variants);
        self.has_variants.insert(line.item_code.clone(), has_variants);
        Ok(has_variants)
    }

    async fn variants_of(&mut self, item_code: &str) -> anyhow::Result<&[Item]> {
        if !self.variants.contains_key(item_code) {
            let found = self
                .repo
                .find_variants(&VariantFilter::of(item_code, self.config.enabled_variants_only))
                .await?;
            self.variants.insert(item_code.to_string(), found);
        }
        Ok(self.variants.get(item_code).map(Vec::as_slice).unwrap_or(&[]))
    }
}
