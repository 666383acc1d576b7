//! Repository for the `customers` table.

use roster_core::filter::FilterSpec;
use roster_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::customer::{CreateCustomer, Customer, UpdateCustomer};

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

/// Column list for `customers` SELECT queries.
const COLUMNS: &str = "id, username, email, phone, address, created_at, updated_at";

/// Column list for INSERT (excludes generated `id` and timestamps).
const INSERT_COLUMNS: &str = "username, email, phone, address";

/// Bind parameters per inserted row.
const INSERT_ARITY: usize = 4;

/// Postgres caps a statement at 65535 bind parameters.
const MAX_ROWS_PER_STATEMENT: usize = 65_535 / INSERT_ARITY;

/// Columns [`CustomerRepo::exists_by_column`] may probe.
const LOOKUP_COLUMNS: &[&str] = &["username", "email", "phone", "address"];

// ---------------------------------------------------------------------------
// CustomerRepo
// ---------------------------------------------------------------------------

/// Provides CRUD, bulk insert and filtered listing for customers.
pub struct CustomerRepo;

impl CustomerRepo {
    /// Insert a single customer, returning the stored row.
    pub async fn create(pool: &PgPool, input: &CreateCustomer) -> Result<Customer, sqlx::Error> {
        let query = format!(
            "INSERT INTO customers ({INSERT_COLUMNS}) VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Customer>(&query)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.address)
            .fetch_one(pool)
            .await
    }

    /// Insert every record in one transaction, `chunk_size` rows per statement.
    ///
    /// Either all rows land or none do: the first failing chunk aborts the
    /// transaction and it is rolled back on drop.
    pub async fn insert_batch(
        pool: &PgPool,
        records: &[CreateCustomer],
        chunk_size: usize,
    ) -> Result<u64, sqlx::Error> {
        if records.is_empty() {
            return Ok(0);
        }

        let chunk_size = chunk_size.clamp(1, MAX_ROWS_PER_STATEMENT);
        let mut tx = pool.begin().await?;
        let mut inserted = 0u64;

        for (chunk_no, chunk) in records.chunks(chunk_size).enumerate() {
            let query = multi_row_insert(chunk.len());
            let mut q = sqlx::query(&query);
            for record in chunk {
                q = q
                    .bind(&record.username)
                    .bind(&record.email)
                    .bind(&record.phone)
                    .bind(&record.address);
            }

            let result = q.execute(&mut *tx).await?;
            inserted += result.rows_affected();
            tracing::debug!(chunk = chunk_no, rows = chunk.len(), "Inserted customer chunk");
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Find a customer by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Customer>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM customers WHERE id = $1");
        sqlx::query_as::<_, Customer>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Update a customer. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateCustomer,
    ) -> Result<Option<Customer>, sqlx::Error> {
        let query = format!(
            "UPDATE customers SET \
                username = COALESCE($2, username), \
                email = COALESCE($3, email), \
                phone = COALESCE($4, phone), \
                address = COALESCE($5, address), \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Customer>(&query)
            .bind(id)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.address)
            .fetch_optional(pool)
            .await
    }

    /// Delete every customer whose ID is in `ids`. Returns the number removed.
    pub async fn delete_batch(pool: &PgPool, ids: &[DbId]) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM customers WHERE id = ANY($1)")
            .bind(ids)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Run a filtered listing, returning the page of rows and the total
    /// number of rows matching the filter.
    pub async fn list(
        pool: &PgPool,
        spec: &FilterSpec,
    ) -> Result<(Vec<Customer>, i64), sqlx::Error> {
        let built = build_customer_query(spec);

        let total = bind_customer_values_scalar(
            sqlx::query_scalar::<_, i64>(&built.count_sql),
            &built.binds,
        )
        .fetch_one(pool)
        .await?;

        let mut q = bind_customer_values(sqlx::query_as::<_, Customer>(&built.data_sql), &built.binds);
        if let Some((limit, offset)) = built.page {
            q = q.bind(limit).bind(offset);
        }
        let rows = q.fetch_all(pool).await?;

        Ok((rows, total))
    }

    /// Whether any customer has exactly `value` in `column`.
    ///
    /// `column` must be one of the customer text columns; anything else is
    /// rejected before reaching SQL.
    pub async fn exists_by_column(
        pool: &PgPool,
        column: &str,
        value: &str,
    ) -> Result<bool, sqlx::Error> {
        let Some(column) = LOOKUP_COLUMNS.iter().copied().find(|c| *c == column) else {
            return Err(sqlx::Error::ColumnNotFound(column.to_string()));
        };

        let query = format!("SELECT EXISTS(SELECT 1 FROM customers WHERE {column} = $1)");
        sqlx::query_scalar::<_, bool>(&query)
            .bind(value)
            .fetch_one(pool)
            .await
    }
}

fn multi_row_insert(rows: usize) -> String {
    let mut query = format!("INSERT INTO customers ({INSERT_COLUMNS}) VALUES ");
    let mut param_idx = 1usize;
    for i in 0..rows {
        if i > 0 {
            query.push_str(", ");
        }
        query.push('(');
        for j in 0..INSERT_ARITY {
            if j > 0 {
                query.push_str(", ");
            }
            query.push('$');
            query.push_str(&param_idx.to_string());
            param_idx += 1;
        }
        query.push(')');
    }
    query
}

// ---------------------------------------------------------------------------
// Dynamic query builder
// ---------------------------------------------------------------------------

/// Typed bind value for dynamically built queries.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    Timestamp(Timestamp),
}

/// SQL for one listing/export request.
///
/// `count_sql` and `data_sql` share the same filter binds. When `page` is
/// set, `data_sql` expects `LIMIT` and `OFFSET` bound after them.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerQuery {
    pub data_sql: String,
    pub count_sql: String,
    pub binds: Vec<BindValue>,
    pub page: Option<(i64, i64)>,
}

/// Build the WHERE clause for a customer filter.
///
/// Returns (where_clause, bind_values, next_bind_idx).
fn build_customer_filter(spec: &FilterSpec) -> (String, Vec<BindValue>, u32) {
    let mut conditions: Vec<String> = Vec::new();
    let mut bind_idx = 1u32;
    let mut bind_values: Vec<BindValue> = Vec::new();

    if let Some(ref username) = spec.username {
        conditions.push(format!("username LIKE ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(contains_pattern(username)));
    }

    if let Some(ref email) = spec.email {
        conditions.push(format!("email LIKE ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(contains_pattern(email)));
    }

    if let Some(range) = spec.created {
        conditions.push(format!(
            "created_at >= ${bind_idx} AND created_at < ${}",
            bind_idx + 1
        ));
        bind_idx += 2;
        bind_values.push(BindValue::Timestamp(range.start));
        bind_values.push(BindValue::Timestamp(range.end));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    (where_clause, bind_values, bind_idx)
}

/// Build the count and data statements for a filter.
///
/// The count wraps the filtered select so both always agree on which rows
/// match. Sorting is applied to the data statement only, and always ends on
/// a unique key.
pub fn build_customer_query(spec: &FilterSpec) -> CustomerQuery {
    let (where_clause, binds, bind_idx) = build_customer_filter(spec);

    let filtered = format!("SELECT {COLUMNS} FROM customers{where_clause}");
    let count_sql = format!("SELECT COUNT(*)::BIGINT FROM ({filtered}) AS filtered");

    let mut order_by: Vec<String> = spec
        .sort
        .iter()
        .map(|clause| format!("{} {}", clause.column, clause.direction.as_sql()))
        .collect();
    // `id` breaks ties so LIMIT/OFFSET pages never overlap.
    if !spec.sort.iter().any(|clause| clause.column == "id") {
        order_by.push("id DESC".to_string());
    }

    let mut data_sql = filtered;
    data_sql.push_str(" ORDER BY ");
    data_sql.push_str(&order_by.join(", "));

    let page = if spec.all {
        None
    } else {
        data_sql.push_str(&format!(" LIMIT ${bind_idx} OFFSET ${}", bind_idx + 1));
        Some((spec.page_size, spec.offset()))
    };

    CustomerQuery {
        data_sql,
        count_sql,
        binds,
        page,
    }
}

/// `%value%` with LIKE wildcards in `value` escaped.
fn contains_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Bind a slice of `BindValue` to a sqlx `QueryAs`.
fn bind_customer_values<'q, O>(
    mut q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}

/// Bind a slice of `BindValue` to a sqlx `QueryScalar`.
fn bind_customer_values_scalar<'q>(
    mut q: sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}
