use anyhow::Result;
use sqlx::PgPool;

pub async fn run_postgres_migrations(pool: &PgPool) -> Result<()> {
    tracing::info!("Running PostgreSQL migrations");

    // Create items table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            item_code VARCHAR PRIMARY KEY,
            item_name VARCHAR NOT NULL DEFAULT '',
            has_variants BOOLEAN NOT NULL DEFAULT FALSE,
            variant_of VARCHAR REFERENCES items(item_code),
            disabled BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create item_variant_attributes table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS item_variant_attributes (
            id BIGSERIAL PRIMARY KEY,
            parent VARCHAR NOT NULL REFERENCES items(item_code) ON DELETE CASCADE,
            attribute VARCHAR NOT NULL,
            attribute_value VARCHAR NOT NULL,
            idx INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create boms table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS boms (
            name VARCHAR PRIMARY KEY,
            item VARCHAR NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            is_default BOOLEAN NOT NULL DEFAULT FALSE,
            docstatus SMALLINT NOT NULL DEFAULT 0,
            routing VARCHAR,
            modified TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create bom_items table; item links are not enforced by the schema
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bom_items (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            parent VARCHAR NOT NULL REFERENCES boms(name) ON DELETE CASCADE,
            item_code VARCHAR NOT NULL DEFAULT '',
            item_name VARCHAR NOT NULL DEFAULT '',
            do_not_explode BOOLEAN NOT NULL DEFAULT FALSE,
            bom_no VARCHAR,
            allow_alternative_item BOOLEAN NOT NULL DEFAULT FALSE,
            qty DOUBLE PRECISION NOT NULL DEFAULT 0,
            uom VARCHAR,
            stock_qty DOUBLE PRECISION NOT NULL DEFAULT 0,
            stock_uom VARCHAR,
            conversion_factor DOUBLE PRECISION NOT NULL DEFAULT 1,
            rate DOUBLE PRECISION NOT NULL DEFAULT 0,
            has_variants BOOLEAN NOT NULL DEFAULT FALSE,
            include_item_in_manufacturing BOOLEAN NOT NULL DEFAULT TRUE,
            amount DOUBLE PRECISION NOT NULL DEFAULT 0,
            sourced_by_supplier BOOLEAN NOT NULL DEFAULT FALSE,
            idx INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create bom_operations table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bom_operations (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            parent VARCHAR NOT NULL REFERENCES boms(name) ON DELETE CASCADE,
            operation VARCHAR NOT NULL DEFAULT '',
            description TEXT,
            workstation VARCHAR,
            time_in_mins DOUBLE PRECISION NOT NULL DEFAULT 0,
            fixed_time BOOLEAN NOT NULL DEFAULT FALSE,
            sequence_id INTEGER NOT NULL DEFAULT 0,
            idx INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create error_log table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS error_log (
            id BIGSERIAL PRIMARY KEY,
            title VARCHAR NOT NULL,
            message TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for the sync lookups
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_variant_of ON items(variant_of)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_item_variant_attributes_parent ON item_variant_attributes(parent)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_boms_item ON boms(item)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_bom_items_parent ON bom_items(parent)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_bom_operations_parent ON bom_operations(parent)")
        .execute(pool)
        .await?;

    tracing::info!("PostgreSQL migrations completed successfully");
    Ok(())
}
