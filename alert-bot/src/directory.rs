//! Subscriber directory adapter.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use crate::error::DirectoryError;
use crate::models::Subscriber;

// ------------------------------------------------------------------ //
//  Trait                                                              //
// ------------------------------------------------------------------ //

/// Read-only view of who is subscribed where.
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    /// Distinct locations with at least one subscriber.
    async fn locations(&self) -> Result<Vec<String>, DirectoryError>;

    /// Subscribers for one location, in directory order.
    async fn subscribers(&self, location: &str) -> Result<Vec<Subscriber>, DirectoryError>;
}

// ------------------------------------------------------------------ //
//  PgSubscriberDirectory (production)                                 //
// ------------------------------------------------------------------ //

pub struct PgSubscriberDirectory {
    pool: PgPool,
}

impl PgSubscriberDirectory {
    /// The pool connects lazily so an unreachable database shows up as a
    /// per-scan `DirectoryError` rather than a start-up failure.
    pub fn connect_lazy(database_url: &str) -> Result<Self, DirectoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberDirectory for PgSubscriberDirectory {
    async fn locations(&self) -> Result<Vec<String>, DirectoryError> {
        let rows: Vec<String> = sqlx::query_scalar(
            r#"SELECT DISTINCT location
               FROM haze_alert_subscribers
               WHERE location IS NOT NULL
               ORDER BY location"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn subscribers(&self, location: &str) -> Result<Vec<Subscriber>, DirectoryError> {
        let rows = sqlx::query(
            r#"SELECT full_name, whatsapp_no
               FROM haze_alert_subscribers
               WHERE location = $1"#,
        )
        .bind(location)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<Subscriber, DirectoryError> {
                Ok(Subscriber {
                    full_name: r.try_get::<Option<String>, _>("full_name")?.unwrap_or_default(),
                    whatsapp_no: r.try_get("whatsapp_no")?,
                    location: location.to_string(),
                })
            })
            .collect()
    }
}

// ------------------------------------------------------------------ //
//  InMemoryDirectory (for tests)                                      //
// ------------------------------------------------------------------ //

#[derive(Debug, Default)]
struct InMemoryState {
    subscribers: Vec<Subscriber>,
    fail_listing: bool,
    failing_locations: HashSet<String>,
}

/// In-memory directory with switchable failures for test assertions.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryDirectory {
    pub fn new(subscribers: Vec<Subscriber>) -> Self {
        let dir = Self::default();
        dir.lock().subscribers = subscribers;
        dir
    }

    /// Make `locations()` fail.
    pub fn fail_listing(&self, fail: bool) {
        self.lock().fail_listing = fail;
    }

    /// Make `subscribers(location)` fail.
    pub fn fail_location(&self, location: &str) {
        self.lock().failing_locations.insert(location.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SubscriberDirectory for InMemoryDirectory {
    async fn locations(&self) -> Result<Vec<String>, DirectoryError> {
        let state = self.lock();
        if state.fail_listing {
            return Err(DirectoryError::Unavailable("listing disabled".into()));
        }
        let mut seen = HashSet::new();
        Ok(state
            .subscribers
            .iter()
            .filter(|s| seen.insert(s.location.clone()))
            .map(|s| s.location.clone())
            .collect())
    }

    async fn subscribers(&self, location: &str) -> Result<Vec<Subscriber>, DirectoryError> {
        let state = self.lock();
        if state.failing_locations.contains(location) {
            return Err(DirectoryError::Unavailable(format!(
                "subscriber query for {location} disabled"
            )));
        }
        Ok(state
            .subscribers
            .iter()
            .filter(|s| s.location == location)
            .cloned()
            .collect())
    }
}
