//! Deterministic seed helpers for repository and pipeline tests.

use crate::DbPool;

pub async fn insert_account(
    pool: &DbPool,
    id: &str,
    name: &str,
    created_at: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO account (id, name, created_at) VALUES (?, ?, ?)")
        .bind(id)
        .bind(name)
        .bind(created_at)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn insert_load(
    pool: &DbPool,
    id: &str,
    account_id: &str,
    reference_number: &str,
    origin: &str,
    destination: &str,
    rate: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO load (id, account_id, reference_number, origin, destination, rate, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, 'posted', '2026-01-01T00:00:00Z')",
    )
    .bind(id)
    .bind(account_id)
    .bind(reference_number)
    .bind(origin)
    .bind(destination)
    .bind(rate)
    .execute(pool)
    .await?;
    Ok(())
}
