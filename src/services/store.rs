//! Per-session dataset state and the registry that hands sessions out.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::Serialize;

use super::cleaning::{self, CleaningConfig, CleaningResult};
use super::dataset::{Column, Dataset};
use super::quality::{self, QualityMetrics};
use crate::error::AnalyticsError;

pub const DEFAULT_SESSION: &str = "default";

/// Returned by every ingestion path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub success: bool,
    pub message: String,
    pub rows: usize,
    pub columns: usize,
    pub headers: Vec<String>,
    pub column_types: Vec<Column>,
}

impl DatasetInfo {
    fn describe(dataset: &Dataset, source: &str) -> Self {
        Self {
            success: true,
            message: format!("Successfully loaded {} rows from {}", dataset.row_count(), source),
            rows: dataset.row_count(),
            columns: dataset.column_count(),
            headers: dataset.headers(),
            column_types: dataset.columns().to_vec(),
        }
    }
}

#[derive(Debug, Default)]
struct DatasetStore {
    raw: Option<Arc<Dataset>>,
    cleaned: Option<Arc<Dataset>>,
    last_cleaning: Option<CleaningResult>,
    quality: Option<QualityMetrics>,
    // bumped whenever the current dataset changes so a stale quality result is never cached
    generation: u64,
}

impl DatasetStore {
    fn current(&self) -> Result<Arc<Dataset>, AnalyticsError> {
        self.cleaned
            .as_ref()
            .or(self.raw.as_ref())
            .cloned()
            .ok_or(AnalyticsError::NoDataLoaded)
    }
}

/// Everything a request reads from one session, taken under a single lock.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub raw: Arc<Dataset>,
    pub current: Arc<Dataset>,
    pub has_cleaned: bool,
    /// Quality of `current`.
    pub quality: QualityMetrics,
}

/// One user's working dataset: the raw load and, once cleaned, its derivative.
#[derive(Debug, Default)]
pub struct Session {
    store: RwLock<DatasetStore>,
}

impl Session {
    /// Replaces the dataset wholesale, discarding anything derived from the previous one.
    pub fn ingest(&self, dataset: Dataset, source: &str) -> DatasetInfo {
        let info = DatasetInfo::describe(&dataset, source);
        let mut store = self.store.write();
        store.raw = Some(Arc::new(dataset));
        store.cleaned = None;
        store.last_cleaning = None;
        store.quality = None;
        store.generation += 1;
        tracing::info!(
            "Ingested {} rows x {} columns from {}",
            info.rows,
            info.columns,
            source
        );
        info
    }

    /// The cleaned dataset when there is one, otherwise the raw load.
    pub fn current(&self) -> Result<Arc<Dataset>, AnalyticsError> {
        self.store.read().current()
    }

    pub fn raw(&self) -> Result<Arc<Dataset>, AnalyticsError> {
        self.store.read().raw.clone().ok_or(AnalyticsError::NoDataLoaded)
    }

    pub fn cleaned(&self) -> Result<Arc<Dataset>, AnalyticsError> {
        let store = self.store.read();
        if store.raw.is_none() {
            return Err(AnalyticsError::NoDataLoaded);
        }
        store.cleaned.clone().ok_or(AnalyticsError::NoCleanedData)
    }

    pub fn has_cleaned(&self) -> bool {
        self.store.read().cleaned.is_some()
    }

    pub fn last_cleaning(&self) -> Option<CleaningResult> {
        self.store.read().last_cleaning.clone()
    }

    /// Cleans the raw dataset and makes the result current. Readers keep going while
    /// the cleaning runs; other writers wait until the result is installed.
    pub fn clean(&self, config: &CleaningConfig) -> Result<CleaningResult, AnalyticsError> {
        let store = self.store.upgradable_read();
        let raw = store.raw.clone().ok_or(AnalyticsError::NoDataLoaded)?;
        let (cleaned, result) = cleaning::clean(&raw, config);

        let mut store = RwLockUpgradableReadGuard::upgrade(store);
        store.cleaned = Some(Arc::new(cleaned));
        store.last_cleaning = Some(result.clone());
        store.quality = None;
        store.generation += 1;
        Ok(result)
    }

    /// Raw, current and the current dataset's quality, all from the same state.
    pub fn snapshot(&self) -> Result<SessionSnapshot, AnalyticsError> {
        let (snapshot, generation, cached) = {
            let store = self.store.read();
            let raw = store.raw.clone().ok_or(AnalyticsError::NoDataLoaded)?;
            let current = store.current()?;
            let (quality, cached) = match &store.quality {
                Some(metrics) => (metrics.clone(), true),
                None => (quality::assess(&current), false),
            };
            let snapshot = SessionSnapshot {
                raw,
                current,
                has_cleaned: store.cleaned.is_some(),
                quality,
            };
            (snapshot, store.generation, cached)
        };

        if !cached {
            let mut store = self.store.write();
            if store.generation == generation {
                store.quality = Some(snapshot.quality.clone());
            }
        }
        Ok(snapshot)
    }

    /// Quality of the current dataset, computed once per ingest or clean.
    pub fn quality(&self) -> Result<QualityMetrics, AnalyticsError> {
        self.snapshot().map(|snapshot| snapshot.quality)
    }
}

/// Idle sessions are evicted after the configured TTL.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Cache<String, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new(max_sessions: u64, ttl: Duration) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(max_sessions)
                .time_to_idle(ttl)
                .build(),
        }
    }

    /// Returns the session for `id`, creating an empty one on first use.
    pub fn get(&self, id: &str) -> Arc<Session> {
        self.sessions
            .get_with(id.to_string(), || Arc::new(Session::default()))
    }

    pub fn create(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.sessions.insert(id.clone(), Arc::new(Session::default()));
        tracing::debug!("Created session {}", id);
        id
    }
}
