use sqlx::Row;

use linehaul_core::domain::account::AccountId;
use linehaul_core::domain::load::LoadId;

use super::{LoadRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLoadRepository {
    pool: DbPool,
}

impl SqlLoadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LoadRepository for SqlLoadRepository {
    async fn list_reference_numbers(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<(LoadId, String)>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, reference_number FROM load WHERE account_id = ? ORDER BY created_at ASC",
        )
        .bind(&account_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let id: String = row.try_get("id")?;
                let reference: String = row.try_get("reference_number")?;
                Ok((LoadId(id), reference))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use linehaul_core::domain::account::AccountId;

    use super::SqlLoadRepository;
    use crate::repositories::LoadRepository;
    use crate::seed::{insert_account, insert_load};
    use crate::{connect_ephemeral, migrations};

    #[tokio::test]
    async fn lists_references_scoped_to_account() {
        let pool =
            connect_ephemeral().await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        insert_account(&pool, "acct-1", "Desk A", "2026-01-01T00:00:00Z")
            .await
            .expect("seed account");
        insert_account(&pool, "acct-2", "Desk B", "2026-01-02T00:00:00Z")
            .await
            .expect("seed account");
        insert_load(&pool, "load-1", "acct-1", "4521", "Dallas, TX", "Atlanta, GA", "1400")
            .await
            .expect("seed load");
        insert_load(&pool, "load-2", "acct-1", "LH-88102", "Memphis, TN", "Laredo, TX", "2100")
            .await
            .expect("seed load");
        insert_load(&pool, "load-3", "acct-2", "9903", "Reno, NV", "Boise, ID", "950")
            .await
            .expect("seed load");

        let repo = SqlLoadRepository::new(pool.clone());
        let refs = repo
            .list_reference_numbers(&AccountId("acct-1".to_string()))
            .await
            .expect("list references");

        assert_eq!(
            refs.iter().map(|(_, reference)| reference.as_str()).collect::<Vec<_>>(),
            vec!["4521", "LH-88102"]
        );

        pool.close().await;
    }
}
