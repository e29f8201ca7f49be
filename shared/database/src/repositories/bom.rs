//! BOM Repository
//!
//! PostgreSQL implementation of `BomRepository`. A repository value is one
//! session: its transaction is opened on first use and ends with `commit`
//! or `rollback`. Dropping an uncommitted session rolls it back.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use bomsync_models::{Bom, BomItem, BomOperation, BomSummary, DocStatus, Item, ItemVariantAttribute};

use super::{BomFilter, BomRepository, InsertOptions, VariantFilter};

type TxSlot = Option<Transaction<'static, Postgres>>;

pub struct PgBomRepository {
    pool: PgPool,
    tx: Mutex<TxSlot>,
}

impl PgBomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            tx: Mutex::new(None),
        }
    }

    /// Locks the session, beginning a transaction if none is open
    async fn session(&self) -> Result<MutexGuard<'_, TxSlot>> {
        let mut guard = self.tx.lock().await;
        if guard.is_none() {
            let tx = self.pool.begin().await.context("Failed to begin transaction")?;
            *guard = Some(tx);
        }
        Ok(guard)
    }

    async fn load_attributes(
        conn: &mut PgConnection,
        item_codes: &[String],
    ) -> Result<HashMap<String, Vec<ItemVariantAttribute>>> {
        let rows: Vec<AttributeRow> = sqlx::query_as(
            r#"
            SELECT parent, attribute, attribute_value
            FROM item_variant_attributes
            WHERE parent = ANY($1)
            ORDER BY parent, idx
            "#,
        )
        .bind(item_codes)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to fetch item variant attributes")?;

        let mut by_item: HashMap<String, Vec<ItemVariantAttribute>> = HashMap::new();
        for row in rows {
            by_item.entry(row.parent).or_default().push(ItemVariantAttribute {
                attribute: row.attribute,
                attribute_value: row.attribute_value,
            });
        }
        Ok(by_item)
    }

    async fn load_items(conn: &mut PgConnection, bom: &str) -> Result<Vec<BomItem>> {
        sqlx::query_as(
            r#"
            SELECT item_code, item_name, do_not_explode, bom_no, allow_alternative_item,
                   qty, uom, stock_qty, stock_uom, conversion_factor, rate, has_variants,
                   include_item_in_manufacturing, amount, sourced_by_supplier, idx
            FROM bom_items
            WHERE parent = $1
            ORDER BY idx
            "#,
        )
        .bind(bom)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to fetch BOM items")
    }

    async fn load_operations(conn: &mut PgConnection, bom: &str) -> Result<Vec<BomOperation>> {
        sqlx::query_as(
            r#"
            SELECT operation, description, workstation, time_in_mins, fixed_time,
                   sequence_id, idx
            FROM bom_operations
            WHERE parent = $1
            ORDER BY idx
            "#,
        )
        .bind(bom)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to fetch BOM operations")
    }
}

fn conn(slot: &mut TxSlot) -> Result<&mut PgConnection> {
    slot.as_deref_mut().context("Transaction is not open")
}

#[async_trait]
impl BomRepository for PgBomRepository {
    async fn find_item(&self, item_code: &str) -> Result<Option<Item>> {
        let mut guard = self.session().await?;
        let conn = conn(&mut guard)?;

        let row: Option<ItemRow> = sqlx::query_as(
            r#"
            SELECT item_code, item_name, has_variants, variant_of, disabled
            FROM items
            WHERE item_code = $1
            "#,
        )
        .bind(item_code)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch item")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut attributes = Self::load_attributes(conn, &[row.item_code.clone()]).await?;
        let attrs = attributes.remove(&row.item_code).unwrap_or_default();
        Ok(Some(row.into_item(attrs)))
    }

    async fn find_variants(&self, filter: &VariantFilter) -> Result<Vec<Item>> {
        let mut guard = self.session().await?;
        let conn = conn(&mut guard)?;

        let rows: Vec<ItemRow> = sqlx::query_as(
            r#"
            SELECT item_code, item_name, has_variants, variant_of, disabled
            FROM items
            WHERE variant_of = $1 AND ($2 = FALSE OR disabled = FALSE)
            ORDER BY item_code
            "#,
        )
        .bind(&filter.template)
        .bind(filter.enabled_only)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to fetch variant items")?;

        let codes: Vec<String> = rows.iter().map(|r| r.item_code.clone()).collect();
        let mut attributes = Self::load_attributes(conn, &codes).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let attrs = attributes.remove(&row.item_code).unwrap_or_default();
                row.into_item(attrs)
            })
            .collect())
    }

    async fn find_boms(&self, filter: &BomFilter) -> Result<Vec<BomSummary>> {
        let mut guard = self.session().await?;
        let conn = conn(&mut guard)?;

        let rows: Vec<BomSummaryRow> = sqlx::query_as(
            r#"
            SELECT name, item, docstatus, is_active
            FROM boms
            WHERE item = ANY($1)
              AND ($2 = FALSE OR is_active = TRUE)
              AND ($3 = FALSE OR docstatus <> 2)
              AND ($4::VARCHAR IS NULL OR name <> $4)
            ORDER BY name
            "#,
        )
        .bind(&filter.items)
        .bind(filter.active_only)
        .bind(filter.exclude_cancelled)
        .bind(&filter.exclude_name)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to fetch BOMs")?;

        rows.into_iter().map(BomSummary::try_from).collect()
    }

    async fn find_bom(&self, name: &str) -> Result<Option<Bom>> {
        let mut guard = self.session().await?;
        let conn = conn(&mut guard)?;

        let row: Option<BomRow> = sqlx::query_as(
            r#"
            SELECT name, item, is_active, is_default, docstatus, routing, modified
            FROM boms
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch BOM")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = Self::load_items(conn, name).await?;
        let operations = Self::load_operations(conn, name).await?;

        Ok(Some(Bom {
            name: row.name,
            item: row.item,
            is_active: row.is_active,
            is_default: row.is_default,
            docstatus: DocStatus::try_from(row.docstatus)?,
            routing: row.routing,
            items,
            operations,
            modified: row.modified,
        }))
    }

    async fn find_bom_items(&self, bom: &str) -> Result<Vec<BomItem>> {
        let mut guard = self.session().await?;
        Self::load_items(conn(&mut guard)?, bom).await
    }

    async fn find_bom_operations(&self, bom: &str) -> Result<Vec<BomOperation>> {
        let mut guard = self.session().await?;
        Self::load_operations(conn(&mut guard)?, bom).await
    }

    async fn delete_bom_items(&self, bom: &str) -> Result<u64> {
        let mut guard = self.session().await?;

        let result = sqlx::query("DELETE FROM bom_items WHERE parent = $1")
            .bind(bom)
            .execute(conn(&mut guard)?)
            .await
            .context("Failed to delete BOM items")?;

        Ok(result.rows_affected())
    }

    async fn delete_bom_operations(&self, bom: &str) -> Result<u64> {
        let mut guard = self.session().await?;

        let result = sqlx::query("DELETE FROM bom_operations WHERE parent = $1")
            .bind(bom)
            .execute(conn(&mut guard)?)
            .await
            .context("Failed to delete BOM operations")?;

        Ok(result.rows_affected())
    }

    async fn insert_bom_item(&self, bom: &str, item: &BomItem, options: InsertOptions) -> Result<()> {
        if !options.ignore_mandatory && (item.item_code.is_empty() || item.uom.is_none()) {
            bail!("Mandatory fields missing on BOM item in {}", bom);
        }

        let mut guard = self.session().await?;
        let conn = conn(&mut guard)?;

        if !options.ignore_links {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM items WHERE item_code = $1)")
                    .bind(&item.item_code)
                    .fetch_one(&mut *conn)
                    .await
                    .context("Failed to check item link")?;
            if !exists {
                bail!("Could not find Item: {}", item.item_code);
            }
        }

        let on_conflict = if options.ignore_if_duplicate {
            "ON CONFLICT (id) DO NOTHING"
        } else {
            ""
        };
        let sql = format!(
            r#"
            INSERT INTO bom_items
                (id, parent, item_code, item_name, do_not_explode, bom_no,
                 allow_alternative_item, qty, uom, stock_qty, stock_uom, conversion_factor,
                 rate, has_variants, include_item_in_manufacturing, amount,
                 sourced_by_supplier, idx)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            {}
            "#,
            on_conflict
        );

        sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(bom)
            .bind(&item.item_code)
            .bind(&item.item_name)
            .bind(item.do_not_explode)
            .bind(&item.bom_no)
            .bind(item.allow_alternative_item)
            .bind(item.qty)
            .bind(&item.uom)
            .bind(item.stock_qty)
            .bind(&item.stock_uom)
            .bind(item.conversion_factor)
            .bind(item.rate)
            .bind(item.has_variants)
            .bind(item.include_item_in_manufacturing)
            .bind(item.amount)
            .bind(item.sourced_by_supplier)
            .bind(item.idx)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to insert BOM item {} into {}", item.item_code, bom))?;

        Ok(())
    }

    async fn insert_bom_operation(
        &self,
        bom: &str,
        operation: &BomOperation,
        options: InsertOptions,
    ) -> Result<()> {
        if !options.ignore_mandatory && operation.operation.is_empty() {
            bail!("Mandatory fields missing on BOM operation in {}", bom);
        }

        let on_conflict = if options.ignore_if_duplicate {
            "ON CONFLICT (id) DO NOTHING"
        } else {
            ""
        };
        let sql = format!(
            r#"
            INSERT INTO bom_operations
                (id, parent, operation, description, workstation, time_in_mins,
                 fixed_time, sequence_id, idx)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            {}
            "#,
            on_conflict
        );

        let mut guard = self.session().await?;

        sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(bom)
            .bind(&operation.operation)
            .bind(&operation.description)
            .bind(&operation.workstation)
            .bind(operation.time_in_mins)
            .bind(operation.fixed_time)
            .bind(operation.sequence_id)
            .bind(operation.idx)
            .execute(conn(&mut guard)?)
            .await
            .with_context(|| format!("Failed to insert BOM operation {} into {}", operation.operation, bom))?;

        Ok(())
    }

    async fn set_bom_routing(&self, bom: &str, routing: Option<&str>) -> Result<()> {
        let mut guard = self.session().await?;

        let result = sqlx::query("UPDATE boms SET routing = $2 WHERE name = $1")
            .bind(bom)
            .bind(routing)
            .execute(conn(&mut guard)?)
            .await
            .context("Failed to update BOM routing")?;

        if result.rows_affected() == 0 {
            bail!("BOM {} not found", bom);
        }
        Ok(())
    }

    async fn touch_bom_modified(&self, bom: &str, at: DateTime<Utc>) -> Result<()> {
        let mut guard = self.session().await?;

        let result = sqlx::query("UPDATE boms SET modified = $2 WHERE name = $1")
            .bind(bom)
            .bind(at)
            .execute(conn(&mut guard)?)
            .await
            .context("Failed to update BOM modified timestamp")?;

        if result.rows_affected() == 0 {
            bail!("BOM {} not found", bom);
        }
        Ok(())
    }

    async fn record_error(&self, title: &str, message: &str) -> Result<()> {
        // Written on the pool, outside the session transaction
        sqlx::query("INSERT INTO error_log (title, message, created_at) VALUES ($1, $2, $3)")
            .bind(title)
            .bind(message)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .context("Failed to record error log entry")?;

        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        if let Some(tx) = self.tx.lock().await.take() {
            tx.commit().await.context("Failed to commit transaction")?;
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        if let Some(tx) = self.tx.lock().await.take() {
            tx.rollback().await.context("Failed to roll back transaction")?;
        }
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct ItemRow {
    item_code: String,
    item_name: String,
    has_variants: bool,
    variant_of: Option<String>,
    disabled: bool,
}

impl ItemRow {
    fn into_item(self, attributes: Vec<ItemVariantAttribute>) -> Item {
        Item {
            item_code: self.item_code,
            item_name: self.item_name,
            has_variants: self.has_variants,
            variant_of: self.variant_of,
            disabled: self.disabled,
            attributes,
        }
    }
}

#[derive(Debug, FromRow)]
struct AttributeRow {
    parent: String,
    attribute: String,
    attribute_value: String,
}

#[derive(Debug, FromRow)]
struct BomSummaryRow {
    name: String,
    item: String,
    docstatus: i16,
    is_active: bool,
}

impl TryFrom<BomSummaryRow> for BomSummary {
    type Error = anyhow::Error;

    fn try_from(row: BomSummaryRow) -> Result<Self> {
        Ok(Self {
            name: row.name,
            item: row.item,
            docstatus: DocStatus::try_from(row.docstatus)?,
            is_active: row.is_active,
        })
    }
}

#[derive(Debug, FromRow)]
struct BomRow {
    name: String,
    item: String,
    is_active: bool,
    is_default: bool,
    docstatus: i16,
    routing: Option<String>,
    modified: DateTime<Utc>,
}

/// Runs against a live database: `BOMSYNC_TEST_DATABASE_URL=... cargo test -- --ignored`
#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_postgres_migrations;
    use sqlx::postgres::PgPoolOptions;

    async fn test_pool() -> PgPool {
        let url = std::env::var("BOMSYNC_TEST_DATABASE_URL")
            .expect("BOMSYNC_TEST_DATABASE_URL must point at a scratch database");
        let pool = PgPoolOptions::new().max_connections(4).connect(&url).await.unwrap();
        run_postgres_migrations(&pool).await.unwrap();
        pool
    }

    /// Seeds template SHIRT-<suffix>, its variant -S and a BOM for the variant.
    async fn seed(pool: &PgPool, suffix: &str) -> (String, String) {
        let template = format!("SHIRT-{}", suffix);
        let variant = format!("{}-S", template);
        let bom = format!("BOM-{}", variant);

        sqlx::query("INSERT INTO items (item_code, has_variants) VALUES ($1, TRUE)")
            .bind(&template)
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO items (item_code, variant_of) VALUES ($1, $2)")
            .bind(&variant)
            .bind(&template)
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO item_variant_attributes (parent, attribute, attribute_value) VALUES ($1, 'Size', 'S')")
            .bind(&variant)
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO boms (name, item, docstatus) VALUES ($1, $2, 1)")
            .bind(&bom)
            .bind(&variant)
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO bom_items (parent, item_code, qty, rate, idx) VALUES ($1, 'FABRIC', 2.5, 11.0, 1)")
            .bind(&bom)
            .execute(pool)
            .await
            .unwrap();

        (template, bom)
    }

    #[tokio::test]
    #[ignore]
    async fn test_queries_and_committed_rewrite() {
        let pool = test_pool().await;
        let (template, bom) = seed(&pool, &Uuid::new_v4().simple().to_string()).await;

        let repo = PgBomRepository::new(pool.clone());
        let variants = repo.find_variants(&VariantFilter::of(&template, true)).await.unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].attribute_value("Size"), Some("S"));

        let boms = repo
            .find_boms(&BomFilter::eligible_for(vec![variants[0].item_code.clone()], "BOM-TEMPLATE"))
            .await
            .unwrap();
        assert_eq!(boms.len(), 1);
        assert!(boms[0].is_submitted());

        assert_eq!(repo.delete_bom_items(&bom).await.unwrap(), 1);
        repo.insert_bom_item(&bom, &BomItem::new("THREAD", 1.0, 0.1), InsertOptions::unchecked())
            .await
            .unwrap();
        repo.insert_bom_operation(&bom, &BomOperation::new("Sewing", "Machine", 30.0), InsertOptions::unchecked())
            .await
            .unwrap();
        repo.set_bom_routing(&bom, Some("Shirt Routing")).await.unwrap();
        repo.commit().await.unwrap();

        let stored = PgBomRepository::new(pool).find_bom(&bom).await.unwrap().unwrap();
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.items[0].item_code, "THREAD");
        assert_eq!(stored.operations.len(), 1);
        assert_eq!(stored.routing.as_deref(), Some("Shirt Routing"));
    }

    #[tokio::test]
    #[ignore]
    async fn test_failed_statement_rolls_back_session() {
        let pool = test_pool().await;
        let (_, bom) = seed(&pool, &Uuid::new_v4().simple().to_string()).await;

        let repo = PgBomRepository::new(pool.clone());
        repo.delete_bom_items(&bom).await.unwrap();
        // parent must reference an existing BOM
        let err = repo
            .insert_bom_item("BOM-DOES-NOT-EXIST", &BomItem::new("THREAD", 1.0, 0.1), InsertOptions::unchecked())
            .await;
        assert!(err.is_err());
        repo.rollback().await.unwrap();

        let after = PgBomRepository::new(pool.clone());
        let items = after.find_bom_items(&bom).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!((items[0].qty, items[0].rate), (2.5, 11.0));

        // the session is usable again after rollback
        assert_eq!(repo.find_bom_items(&bom).await.unwrap().len(), 1);
        repo.record_error("Sync Variant BOMs", &format!("rolled back {}", bom)).await.unwrap();
        let logged: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM error_log WHERE message = $1")
            .bind(format!("rolled back {}", bom))
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(logged, 1);
    }
}
