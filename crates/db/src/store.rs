//! Postgres implementation of the import pipeline seams.

use async_trait::async_trait;
use roster_core::customer::CreateCustomer;
use roster_core::ingest::BatchWriter;
use roster_core::uniqueness::UniquenessLookup;

use crate::repositories::CustomerRepo;
use crate::DbPool;

/// Default number of rows per INSERT statement during an import commit.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Customer store backed by a connection pool.
#[derive(Debug, Clone)]
pub struct PgCustomerStore {
    pool: DbPool,
    batch_size: usize,
}

impl PgCustomerStore {
    pub fn new(pool: DbPool, batch_size: usize) -> Self {
        Self { pool, batch_size }
    }
}

#[async_trait]
impl UniquenessLookup for PgCustomerStore {
    type Error = sqlx::Error;

    async fn exists_in_store(&self, field: &str, value: &str) -> Result<bool, sqlx::Error> {
        CustomerRepo::exists_by_column(&self.pool, field, value).await
    }
}

#[async_trait]
impl BatchWriter<CreateCustomer> for PgCustomerStore {
    type Error = sqlx::Error;

    async fn commit(&self, records: &[CreateCustomer]) -> Result<u64, sqlx::Error> {
        CustomerRepo::insert_batch(&self.pool, records, self.batch_size).await
    }
}
