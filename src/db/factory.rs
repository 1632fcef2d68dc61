//! Repository selection and construction.

use std::str::FromStr;
use std::sync::Arc;

use super::repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
use super::repositories::PostgresRepository;
use super::repository::{RepositoryError, RepositoryResult, SchedulingRepository};
use super::PostgresConfig;

/// Which storage backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    Postgres,
    Local,
}

impl FromStr for RepositoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown repository type: {}", other)),
        }
    }
}

impl RepositoryType {
    /// Backend selection from the environment: `REPOSITORY_TYPE` wins, an
    /// unrecognized value or no value with a database URL present selects
    /// what fits, and the in-memory backend is the fallback.
    pub fn from_env() -> Self {
        match std::env::var("REPOSITORY_TYPE") {
            Ok(value) => value.parse().unwrap_or(Self::Local),
            Err(_) => {
                let has_url = std::env::var("DATABASE_URL").is_ok()
                    || std::env::var("PG_DATABASE_URL").is_ok();
                if has_url {
                    Self::Postgres
                } else {
                    Self::Local
                }
            }
        }
    }
}

/// Builds [`SchedulingRepository`] instances for the configured backend.
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Construct the selected backend. `postgres_config` is required for
    /// Postgres and ignored otherwise.
    pub async fn create(
        repo_type: RepositoryType,
        postgres_config: Option<&PostgresConfig>,
    ) -> RepositoryResult<Arc<dyn SchedulingRepository>> {
        match repo_type {
            RepositoryType::Local => Ok(Self::create_local()),
            #[cfg(feature = "postgres-repo")]
            RepositoryType::Postgres => {
                let config = postgres_config.ok_or_else(|| {
                    RepositoryError::configuration("Postgres repository requires PostgresConfig")
                })?;
                let repo: Arc<dyn SchedulingRepository> = Self::create_postgres(config).await?;
                Ok(repo)
            }
            #[cfg(not(feature = "postgres-repo"))]
            RepositoryType::Postgres => {
                let _ = postgres_config;
                Err(RepositoryError::configuration(
                    "Postgres repository feature not enabled",
                ))
            }
        }
    }

    #[cfg(feature = "postgres-repo")]
    pub async fn create_postgres(
        config: &PostgresConfig,
    ) -> RepositoryResult<Arc<PostgresRepository>> {
        Ok(Arc::new(PostgresRepository::new(config.clone())?))
    }

    pub fn create_local() -> Arc<dyn SchedulingRepository> {
        Arc::new(LocalRepository::new())
    }

    /// Construct the backend the environment selects (see
    /// [`RepositoryType::from_env`]).
    pub async fn from_env() -> RepositoryResult<Arc<dyn SchedulingRepository>> {
        match RepositoryType::from_env() {
            RepositoryType::Local => Ok(Self::create_local()),
            #[cfg(feature = "postgres-repo")]
            RepositoryType::Postgres => {
                let config = PostgresConfig::from_env().map_err(RepositoryError::configuration)?;
                let repo: Arc<dyn SchedulingRepository> = Self::create_postgres(&config).await?;
                Ok(repo)
            }
            #[cfg(not(feature = "postgres-repo"))]
            RepositoryType::Postgres => Err(RepositoryError::configuration(
                "Postgres repository feature not enabled",
            )),
        }
    }
}
