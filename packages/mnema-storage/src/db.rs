use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::Result;

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS memory_records (
	record_id UUID PRIMARY KEY,
	user_id TEXT NOT NULL,
	project_id TEXT NOT NULL,
	document_type TEXT NOT NULL,
	payload JSONB NOT NULL,
	embedding REAL[],
	created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_memory_records_tenant
	ON memory_records (user_id, project_id);
CREATE INDEX IF NOT EXISTS idx_memory_records_created_at
	ON memory_records (created_at)";

pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &mnema_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let lock_id: i64 = 6_630_113;
		// Advisory locks are held per connection. Run the whole script inside
		// one transaction so the lock releases when the transaction ends.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(lock_id).execute(&mut *tx).await?;

		for statement in SCHEMA.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}
}
