use {
    crate::{search::ManagedResource, LuceneError, LuceneResult},
    log::{debug, error},
    parking_lot::Mutex,
    std::{
        collections::BTreeMap,
        fmt::{Debug, Formatter, Result as FmtResult},
        sync::Arc,
        time::Instant,
    },
};

/// Decides which recorded resources [SearcherLifetimeManager::prune] removes.
pub trait Pruner<G> {
    /// Return `true` if the resource should be pruned.
    ///
    /// `age_sec` is how long ago the resource was replaced by the next newer recorded resource, in seconds;
    /// it is `0.0` for the newest one, which is also the only one with `is_most_recent` set.
    fn do_prune(&self, age_sec: f64, is_most_recent: bool, resource: &G) -> bool;
}

impl<G, F> Pruner<G> for F
where
    F: Fn(f64, bool, &G) -> bool,
{
    fn do_prune(&self, age_sec: f64, is_most_recent: bool, resource: &G) -> bool {
        self(age_sec, is_most_recent, resource)
    }
}

/// Simple pruner that drops any resource older than the newest recorded one by more than the specified number
/// of seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PruneByAge {
    max_age_sec: f64,
}

impl PruneByAge {
    /// Create a pruner for resources older than `max_age_sec`. Fails with [LuceneError::IllegalArgument] if
    /// the age is negative.
    pub fn new(max_age_sec: f64) -> LuceneResult<Self> {
        if max_age_sec.is_nan() || max_age_sec < 0.0 {
            return Err(LuceneError::IllegalArgument(format!("max_age_sec must be >= 0 (got {max_age_sec})")));
        }
        Ok(Self {
            max_age_sec,
        })
    }

    /// Returns the maximum age in seconds.
    #[inline]
    pub fn max_age_sec(&self) -> f64 {
        self.max_age_sec
    }
}

impl<G> Pruner<G> for PruneByAge {
    fn do_prune(&self, age_sec: f64, is_most_recent: bool, _: &G) -> bool {
        !is_most_recent && age_sec > self.max_age_sec
    }
}

struct Tracker<G> {
    resource: Arc<G>,
    recorded: Instant,
}

impl<G> Tracker<G> {
    fn new(resource: Arc<G>) -> Self {
        Self {
            resource,
            recorded: Instant::now(),
        }
    }
}

struct Trackers<G: ManagedResource> {
    by_version: BTreeMap<G::Version, Tracker<G>>,
    closed: bool,
}

/// Keeps track of resources that are still needed for follow-on requests, such as paging through search
/// results or drilling down, so that the follow-on request runs against the same point-in-time view.
///
/// Call [SearcherLifetimeManager::record] with a resource you obtained from a [crate::search::ReferenceManager]
/// and hand the returned token to the client. When the follow-on request arrives, pass the token to
/// [SearcherLifetimeManager::acquire]: if the resource is still tracked you get it back (release it with
/// [SearcherLifetimeManager::release] when done), otherwise fall back to the current resource.
///
/// Call [SearcherLifetimeManager::prune] periodically, e.g. with [PruneByAge], to stop tracking old
/// resources. Every tracked resource holds one reference, so pruning is what allows old resources to be
/// disposed.
pub struct SearcherLifetimeManager<G: ManagedResource> {
    trackers: Mutex<Trackers<G>>,
}

impl<G: ManagedResource> Debug for SearcherLifetimeManager<G> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let trackers = self.trackers.lock();
        f.debug_struct("SearcherLifetimeManager")
            .field("versions", &trackers.by_version.keys().collect::<Vec<_>>())
            .field("closed", &trackers.closed)
            .finish()
    }
}

impl<G: ManagedResource> Default for SearcherLifetimeManager<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: ManagedResource> SearcherLifetimeManager<G> {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            trackers: Mutex::new(Trackers {
                by_version: BTreeMap::new(),
                closed: false,
            }),
        }
    }

    fn closed_error() -> LuceneError {
        LuceneError::AlreadyClosed("this SearcherLifetimeManager instance is closed".to_string())
    }

    /// Records that you are now using this resource. Always call this when you've obtained a possibly new
    /// resource, e.g. from [crate::search::ReferenceManager::acquire]. It's fine if you already passed the same
    /// resource to this method before.
    ///
    /// Returns the token to pass to [SearcherLifetimeManager::acquire] later. The manager takes its own
    /// reference; the caller's reference is untouched. Fails with [LuceneError::IllegalArgument] if a different
    /// resource with the same version is already recorded.
    pub fn record(&self, resource: &Arc<G>) -> LuceneResult<G::Version> {
        let version = resource.version();
        let mut trackers = self.trackers.lock();
        if trackers.closed {
            return Err(Self::closed_error());
        }

        if let Some(tracker) = trackers.by_version.get(&version) {
            if Arc::ptr_eq(&tracker.resource, resource) {
                return Ok(version);
            }
            return Err(LuceneError::IllegalArgument(format!(
                "the provided resource has the same version ({version:?}) as a previously recorded resource that is not the same instance"
            )));
        }

        if !resource.try_inc_ref() {
            return Err(LuceneError::AlreadyClosed(format!(
                "the resource with version {version:?} has already been disposed"
            )));
        }

        debug!("Recording version {version:?}");
        trackers.by_version.insert(version, Tracker::new(Arc::clone(resource)));
        Ok(version)
    }

    /// Retrieve a previously recorded resource, if it has not yet been pruned. Returns `None` if the token is
    /// unknown or the resource was pruned.
    ///
    /// A returned resource holds a new reference; you must pass it to [SearcherLifetimeManager::release]
    /// when done.
    pub fn acquire(&self, version: G::Version) -> LuceneResult<Option<Arc<G>>> {
        let trackers = self.trackers.lock();
        if trackers.closed {
            return Err(Self::closed_error());
        }

        Ok(trackers.by_version.get(&version).and_then(|tracker| {
            tracker.resource.try_inc_ref().then(|| Arc::clone(&tracker.resource))
        }))
    }

    /// Release a resource previously obtained from [SearcherLifetimeManager::acquire].
    ///
    /// Fails with [LuceneError::IllegalState] if the resource has no references left.
    pub fn release(&self, resource: &Arc<G>) -> LuceneResult<()> {
        resource.dec_ref()
    }

    /// Calls the provided [Pruner] to prune entries. Entries are visited newest first; the first one is the
    /// most recent and has an age of zero. Every other entry's age is the time since the next newer entry was
    /// recorded, since that is when this one stopped being current.
    ///
    /// Pruned entries are no longer tracked and their reference is released; callers that already acquired
    /// them keep them alive until released.
    pub fn prune(&self, pruner: &dyn Pruner<G>) -> LuceneResult<()> {
        let mut trackers = self.trackers.lock();
        if trackers.closed {
            return Err(Self::closed_error());
        }

        let now = Instant::now();
        let mut newer_recorded: Option<Instant> = None;
        let mut pruned = Vec::new();

        for (version, tracker) in trackers.by_version.iter().rev() {
            let (age_sec, is_most_recent) = match newer_recorded {
                None => (0.0, true),
                Some(newer) => (now.saturating_duration_since(newer).as_secs_f64(), false),
            };

            if pruner.do_prune(age_sec, is_most_recent, tracker.resource.as_ref()) {
                debug!("Pruning version {version:?} (age {age_sec:.3}s)");
                pruned.push(*version);
            }
            newer_recorded = Some(tracker.recorded);
        }

        let pruned: Vec<_> =
            pruned.into_iter().filter_map(|version| trackers.by_version.remove(&version)).collect();
        drop(trackers);

        release_all(pruned.into_iter().map(|tracker| tracker.resource), "prune")
    }

    /// Returns the number of tracked resources.
    pub fn len(&self) -> usize {
        self.trackers.lock().by_version.len()
    }

    /// Returns `true` if no resources are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close this manager to further recording, and release every tracked resource. Resources that were
    /// acquired and not yet released stay alive until they are released. Closing more than once is a no-op.
    ///
    /// Later calls to [SearcherLifetimeManager::record], [SearcherLifetimeManager::acquire] and
    /// [SearcherLifetimeManager::prune] fail with [LuceneError::AlreadyClosed].
    pub fn close(&self) {
        let trackers = {
            let mut trackers = self.trackers.lock();
            trackers.closed = true;
            std::mem::take(&mut trackers.by_version)
        };

        if !trackers.is_empty() {
            debug!("Closing SearcherLifetimeManager; releasing {} tracked versions", trackers.len());
        }

        // Failures are already logged; close itself never fails.
        let _ = release_all(trackers.into_values().map(|tracker| tracker.resource), "close");
    }
}

/// Releases every resource, logging failures and returning the first one.
fn release_all<G: ManagedResource>(resources: impl Iterator<Item = Arc<G>>, during: &str) -> LuceneResult<()> {
    let mut first_error = None;
    for resource in resources {
        if let Err(e) = resource.dec_ref() {
            error!("Failed to release version {:?} during {during}: {e}", resource.version());
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

impl<G: ManagedResource> Drop for SearcherLifetimeManager<G> {
    fn drop(&mut self) {
        self.close();
    }
}
