use crate::backend::{BackendError, HttpBackend};
use crate::models::{CarouselsReport, ImagesReport, RegenerationTarget, TargetCollection};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Whatever shows the asset listings. Workflows call it once a regeneration has landed.
#[async_trait]
pub trait ListingRefresher: Send + Sync {
    async fn refresh(&self, collection: TargetCollection);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CollectionListing {
    Images(ImagesReport),
    Carousels(CarouselsReport),
}

#[derive(Debug)]
struct Slot<T> {
    report: Option<T>,
    fetched_at: Option<DateTime<Utc>>,
    generation: u64,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self { report: None, fetched_at: None, generation: 0 }
    }
}

impl<T: Clone> Slot<T> {
    /// Stores a fetch result unless a later-started fetch already landed.
    fn store(&mut self, generation: u64, report: Option<T>) -> Option<T> {
        if generation < self.generation {
            return self.report.clone();
        }
        self.generation = generation;
        self.report = report;
        self.fetched_at = Some(Utc::now());
        self.report.clone()
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    images: Slot<ImagesReport>,
    carousels: Slot<CarouselsReport>,
}

/// Last fetched images and carousels reports.
///
/// Every refresh replaces the stored report wholesale; entries are never patched in place.
/// Each fetch is numbered when it starts, so a slow response never overwrites a newer one.
pub struct ListingCache {
    backend: Arc<HttpBackend>,
    snapshot: RwLock<Snapshot>,
    generation: AtomicU64,
}

impl ListingCache {
    pub fn new(backend: Arc<HttpBackend>) -> Self {
        Self { backend, snapshot: RwLock::default(), generation: AtomicU64::new(0) }
    }

    /// Re-fetches one collection and replaces its snapshot.
    ///
    /// Returns whatever the snapshot holds afterwards.
    pub async fn reload(&self, collection: TargetCollection) -> Result<Option<CollectionListing>, BackendError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        match collection {
            TargetCollection::Images => {
                let report = self.backend.fetch_content::<ImagesReport>(collection.into()).await?;
                let stored = self.snapshot.write().images.store(generation, report);
                Ok(stored.map(CollectionListing::Images))
            }
            TargetCollection::Carousels => {
                let report = self.backend.fetch_content::<CarouselsReport>(collection.into()).await?;
                let stored = self.snapshot.write().carousels.store(generation, report);
                Ok(stored.map(CollectionListing::Carousels))
            }
        }
    }

    pub fn get(&self, collection: TargetCollection) -> Option<CollectionListing> {
        let guard = self.snapshot.read();
        match collection {
            TargetCollection::Images => guard.images.report.clone().map(CollectionListing::Images),
            TargetCollection::Carousels => guard.carousels.report.clone().map(CollectionListing::Carousels),
        }
    }

    /// When the collection was last fetched, whether or not it had content.
    pub fn fetched_at(&self, collection: TargetCollection) -> Option<DateTime<Utc>> {
        let guard = self.snapshot.read();
        match collection {
            TargetCollection::Images => guard.images.fetched_at,
            TargetCollection::Carousels => guard.carousels.fetched_at,
        }
    }

    /// Fresh listing from the backend. If the fetch fails the last snapshot is served,
    /// provided there is one.
    pub async fn latest(&self, collection: TargetCollection) -> Result<Option<CollectionListing>, BackendError> {
        match self.reload(collection).await {
            Ok(listing) => Ok(listing),
            Err(e) if self.fetched_at(collection).is_some() => {
                warn!(%collection, "⚠️ Listing fetch failed, serving last snapshot: {}", e);
                Ok(self.get(collection))
            }
            Err(e) => Err(e),
        }
    }

    /// Every asset in the cached listing that can be opened for regeneration.
    pub fn targets(&self, collection: TargetCollection) -> Vec<RegenerationTarget> {
        match self.get(collection) {
            Some(CollectionListing::Images(report)) => report
                .images_generated
                .iter()
                .filter_map(|img| img.regeneration_target())
                .collect(),
            Some(CollectionListing::Carousels(report)) => report
                .carousels
                .iter()
                .flat_map(|c| c.slides.iter())
                .filter_map(|slide| slide.regeneration_target())
                .collect(),
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl ListingRefresher for ListingCache {
    async fn refresh(&self, collection: TargetCollection) {
        match self.reload(collection).await {
            Ok(Some(_)) => info!(%collection, "🔄 Listing refreshed"),
            Ok(None) => info!(%collection, "🔄 Listing refreshed, no content yet"),
            // Keep the previous snapshot on failure.
            Err(e) => warn!(%collection, "⚠️ Listing refresh failed: {}", e),
        }
    }
}
