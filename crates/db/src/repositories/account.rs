use linehaul_core::domain::account::AccountId;

use super::{AccountRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAccountRepository {
    pool: DbPool,
}

impl SqlAccountRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AccountRepository for SqlAccountRepository {
    async fn any_account_id(&self) -> Result<Option<AccountId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, String>(
            "SELECT id FROM account ORDER BY created_at ASC, id ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(id.map(AccountId))
    }
}
