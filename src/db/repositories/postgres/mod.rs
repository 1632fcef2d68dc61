//! Postgres repository implementation using Diesel.
//!
//! Connections come from an r2d2 pool; statements run on the blocking thread
//! pool with a bounded retry for transient failures. Pending migrations
//! (schema plus projector/team seed rows) are applied on construction.
//!
//! ## Environment
//!
//! - `DATABASE_URL` or `PG_DATABASE_URL`: connection string (required)
//! - `PG_POOL_MAX` / `PG_POOL_MIN`: pool bounds (default 10 / 1)
//! - `PG_CONN_TIMEOUT_SEC`: connection timeout (default 30)
//! - `PG_IDLE_TIMEOUT_SEC`: idle connection timeout (default 600)
//! - `PG_MAX_RETRIES` / `PG_RETRY_DELAY_MS`: retry bounds (default 3 / 100)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::time::Duration;
use tokio::task;

use crate::api::{AllocationId, ProjectorId, TeamId, TimeSlotId};
use crate::db::models::{AllocatedSlotRecord, NewTimeSlot};
use crate::db::repository::{
    ErrorContext, RepositoryError, RepositoryResult, SchedulingRepository,
};

mod models;
mod schema;

use models::{joined_record, AllocationRow, NewAllocationRow, NewTimeSlotRow, TimeSlotRow};
use schema::{allocations, time_slots};

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Connection and retry settings for the Postgres backend.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub database_url: String,
    pub max_pool_size: u32,
    pub min_pool_size: u32,
    pub connection_timeout_sec: u64,
    pub idle_timeout_sec: u64,
    /// Retry attempts for transient failures, on top of the first try.
    pub max_retries: u32,
    /// First retry delay; doubles per attempt.
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

impl PostgresConfig {
    /// Settings from the environment; fails without a database URL.
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let defaults = Self::default();
        Ok(Self {
            database_url,
            max_pool_size: env_or("PG_POOL_MAX", defaults.max_pool_size),
            min_pool_size: env_or("PG_POOL_MIN", defaults.min_pool_size),
            connection_timeout_sec: env_or("PG_CONN_TIMEOUT_SEC", defaults.connection_timeout_sec),
            idle_timeout_sec: env_or("PG_IDLE_TIMEOUT_SEC", defaults.idle_timeout_sec),
            max_retries: env_or("PG_MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_or("PG_RETRY_DELAY_MS", defaults.retry_delay_ms),
        })
    }
}

/// Postgres-backed implementation of the storage gateway.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresRepository {
    /// Build the pool and apply pending migrations.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection(e.to_string())
                    .with_context(ErrorContext::new("create_pool"))
            })?;

        let mut conn = pool.get().map_err(RepositoryError::from)?;
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal(format!("migration failed: {}", e))
                .with_context(ErrorContext::new("run_migrations"))
        })?;
        drop(conn);

        Ok(Self { pool, config })
    }

    /// Run a statement on the blocking pool, retrying transient failures
    /// with exponential backoff.
    async fn run<T, F>(&self, operation: &'static str, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: Fn(&mut PgConnection) -> RepositoryResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        task::spawn_blocking(move || {
            let mut attempt = 0;
            loop {
                let result = pool
                    .get()
                    .map_err(RepositoryError::from)
                    .and_then(|mut conn| f(&mut conn));
                match result {
                    Ok(value) => return Ok(value),
                    Err(err) if err.is_retryable() && attempt < max_retries => {
                        attempt += 1;
                        std::thread::sleep(delay);
                        delay *= 2;
                    }
                    Err(err) => {
                        return Err(err.with_context(
                            ErrorContext::new(operation)
                                .with_detail(format!("attempts={}", attempt + 1)),
                        ))
                    }
                }
            }
        })
        .await
        .map_err(|e| {
            RepositoryError::internal(format!("blocking task join: {}", e))
                .with_operation(operation)
        })?
    }
}

#[async_trait]
impl SchedulingRepository for PostgresRepository {
    async fn load_allocations_for_year(
        &self,
        year_start: DateTime<Utc>,
        year_end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<AllocatedSlotRecord>> {
        self.run("load_allocations_for_year", move |conn| {
            let rows: Vec<(AllocationRow, TimeSlotRow)> = allocations::table
                .inner_join(time_slots::table)
                .filter(
                    time_slots::start_at
                        .ge(year_start)
                        .and(time_slots::start_at.lt(year_end))
                        .or(time_slots::recur_every_minutes.gt(0)),
                )
                .select((AllocationRow::as_select(), TimeSlotRow::as_select()))
                .load(conn)
                .map_err(RepositoryError::from)?;

            Ok(rows
                .into_iter()
                .map(|(allocation, slot)| joined_record(allocation, slot))
                .collect())
        })
        .await
    }

    async fn insert_time_slot(&self, slot: &NewTimeSlot) -> RepositoryResult<TimeSlotId> {
        let row = NewTimeSlotRow::from(slot);
        self.run("insert_time_slot", move |conn| {
            let inserted: TimeSlotRow = diesel::insert_into(time_slots::table)
                .values(&row)
                .returning(TimeSlotRow::as_returning())
                .get_result(conn)
                .map_err(RepositoryError::from)?;
            Ok(TimeSlotId::new(inserted.id))
        })
        .await
    }

    async fn insert_allocation(
        &self,
        projector: ProjectorId,
        time_slot: TimeSlotId,
        team: TeamId,
    ) -> RepositoryResult<AllocationId> {
        let row = NewAllocationRow {
            projector_id: projector.value(),
            time_slot_id: time_slot.value(),
            team_id: team.value(),
        };
        self.run("insert_allocation", move |conn| {
            let inserted: AllocationRow = diesel::insert_into(allocations::table)
                .values(&row)
                .returning(AllocationRow::as_returning())
                .get_result(conn)
                .map_err(RepositoryError::from)?;
            Ok(AllocationId::new(inserted.id))
        })
        .await
    }

    async fn find_allocation(
        &self,
        id: AllocationId,
    ) -> RepositoryResult<Option<AllocatedSlotRecord>> {
        let allocation_id = id.value();
        self.run("find_allocation", move |conn| {
            let row: Option<(AllocationRow, TimeSlotRow)> = allocations::table
                .inner_join(time_slots::table)
                .filter(allocations::id.eq(allocation_id))
                .select((AllocationRow::as_select(), TimeSlotRow::as_select()))
                .first(conn)
                .optional()
                .map_err(RepositoryError::from)?;

            Ok(row.map(|(allocation, slot)| joined_record(allocation, slot)))
        })
        .await
    }

    async fn delete_allocation(&self, id: AllocationId) -> RepositoryResult<()> {
        let allocation_id = id.value();
        self.run("delete_allocation", move |conn| {
            let affected =
                diesel::delete(allocations::table.filter(allocations::id.eq(allocation_id)))
                    .execute(conn)
                    .map_err(RepositoryError::from)?;
            if affected == 0 {
                return Err(RepositoryError::not_found(format!(
                    "allocation {} does not exist",
                    allocation_id
                ))
                .with_context(
                    ErrorContext::new("delete_allocation")
                        .with_target(format!("allocation {}", allocation_id)),
                ));
            }
            Ok(())
        })
        .await
    }

    async fn delete_time_slot(&self, id: TimeSlotId) -> RepositoryResult<()> {
        let slot_id = id.value();
        self.run("delete_time_slot", move |conn| {
            let affected = diesel::delete(time_slots::table.filter(time_slots::id.eq(slot_id)))
                .execute(conn)
                .map_err(RepositoryError::from)?;
            if affected == 0 {
                return Err(RepositoryError::not_found(format!(
                    "time slot {} does not exist",
                    slot_id
                ))
                .with_context(
                    ErrorContext::new("delete_time_slot")
                        .with_target(format!("time_slot {}", slot_id)),
                ));
            }
            Ok(())
        })
        .await
    }

    async fn health_check(&self) -> RepositoryResult<bool> {
        self.run("health_check", |conn| {
            diesel::sql_query("SELECT 1")
                .execute(conn)
                .map_err(RepositoryError::from)?;
            Ok(true)
        })
        .await
    }
}
