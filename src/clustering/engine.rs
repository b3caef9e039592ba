use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

use crate::config::ClusterConfig;
use crate::entity::{Gazetteer, TextNormalizer};
use crate::error::{ClusterError, Result};
use crate::store::ClusterStore;
use crate::TARGET_CLUSTER;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Online clustering engine over a [`ClusterStore`].
///
/// Every write for a tenant happens while holding that tenant's lock, so the
/// match-then-write sequence never interleaves with another assignment or a decay
/// sweep for the same site. Different tenants proceed in parallel.
pub struct ClusterEngine<S: ClusterStore> {
    store: S,
    config: ClusterConfig,
    normalizer: TextNormalizer,
    site_normalizers: HashMap<String, TextNormalizer>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    clock: Clock,
}

impl<S: ClusterStore> ClusterEngine<S> {
    /// Validates the configuration and loads the store's gazetteer entries on top of the
    /// built-in dictionary.
    ///
    /// Shared entries extend the dictionary of every site. Entries owned by a site are
    /// layered over that only for the owning site.
    pub async fn new(store: S, config: ClusterConfig) -> Result<Self> {
        config.validate()?;

        let entries = store.gazetteer_entries().await?;
        let store_entries = entries.len();

        let mut shared = Vec::new();
        let mut per_site: HashMap<String, Vec<_>> = HashMap::new();
        for entry in entries {
            match entry.site_id.clone() {
                Some(site_id) => per_site.entry(site_id).or_default().push(entry),
                None => shared.push(entry),
            }
        }

        let gazetteer = Gazetteer::builtin().with_entries(shared);
        let site_normalizers = per_site
            .into_iter()
            .map(|(site_id, entries)| {
                let own = gazetteer.clone().with_entries(entries);
                (site_id, TextNormalizer::new(Arc::new(own)))
            })
            .collect::<HashMap<_, _>>();

        info!(
            target: TARGET_CLUSTER,
            "Cluster engine ready: {} gazetteer names ({} from store, {} sites with own aliases)",
            gazetteer.len(),
            store_entries,
            site_normalizers.len()
        );

        Ok(ClusterEngine {
            store,
            config,
            normalizer: TextNormalizer::new(Arc::new(gazetteer)),
            site_normalizers,
            locks: DashMap::new(),
            clock: Arc::new(Utc::now),
        })
    }

    /// Replaces the wall clock, for sweeps run against a fixed reference time.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Normalizer with the site's own aliases, or the shared one.
    pub fn normalizer_for(&self, site_id: &str) -> &TextNormalizer {
        self.site_normalizers
            .get(site_id)
            .unwrap_or(&self.normalizer)
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Waits for the tenant's lock, giving up after the configured lock timeout.
    pub(crate) async fn lock_tenant(&self, site_id: &str) -> Result<OwnedMutexGuard<()>> {
        let lock = self
            .locks
            .entry(site_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let timeout = self.config.assigner.lock_timeout();
        tokio::time::timeout(timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                ClusterError::ConcurrencyConflict(format!(
                    "timed out after {:?} waiting for site {} lock",
                    timeout, site_id
                ))
            })
    }
}
