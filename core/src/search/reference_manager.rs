use {
    crate::{LuceneError, LuceneResult},
    arc_swap::ArcSwapOption,
    log::{debug, error},
    parking_lot::Mutex,
    std::{
        fmt::{Debug, Formatter, Result as FmtResult},
        hash::Hash,
        ops::Deref,
        sync::{
            atomic::{AtomicU64, Ordering},
            Arc, Weak,
        },
    },
};

const REFERENCE_MANAGER_IS_CLOSED_MSG: &str = "this ReferenceManager is closed";

/// The capabilities a resource needs to be shared through a [ReferenceManager].
///
/// The resource carries its own reference count. The manager holds one reference on the current
/// resource, and every [ReferenceManager::acquire] takes another. When the count reaches zero the
/// resource disposes of itself; this must happen exactly once.
pub trait ManagedResource: Send + Sync + 'static {
    /// Key used to compare resources and to identify historical versions. Newer resources have larger
    /// versions.
    type Version: Copy + Debug + Eq + Hash + Ord + Send + Sync + 'static;

    /// Takes a reference if the resource has not been disposed yet.
    fn try_inc_ref(&self) -> bool;

    /// Gives back a reference, disposing of the resource if it was the last one. Must fail with
    /// [LuceneError::IllegalState] if the count is already zero.
    fn dec_ref(&self) -> LuceneResult<()>;

    /// Returns the current reference count.
    fn ref_count(&self) -> i32;

    /// Returns the version of this resource.
    fn version(&self) -> Self::Version;
}

/// Builds the next resource for a [ReferenceManager].
pub trait RefreshStrategy<G>: Send + Sync {
    /// Returns a resource newer than `current`, or `None` if there is nothing new. A returned resource
    /// carries one reference, which is handed to the manager. `current` is only borrowed.
    fn refresh_if_needed(&self, current: &Arc<G>) -> LuceneResult<Option<Arc<G>>>;

    /// Called after every successful refresh attempt, whether or not a new resource was installed, while the
    /// refresh lock is still held.
    fn after_maybe_refresh(&self) -> LuceneResult<()> {
        Ok(())
    }

    /// Called once when the manager is closed.
    fn after_close(&self) {}
}

impl<G, F> RefreshStrategy<G> for F
where
    F: Fn(&Arc<G>) -> LuceneResult<Option<Arc<G>>> + Send + Sync,
{
    fn refresh_if_needed(&self, current: &Arc<G>) -> LuceneResult<Option<Arc<G>>> {
        self(current)
    }
}

/// Identifies a listener registered with [ReferenceManager::add_listener].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ListenerId(u64);

/// Callbacks run around every refresh attempt, and once when the manager is closed.
///
/// Listeners run synchronously on the refreshing thread while the refresh lock is held, in the order they
/// were added. `before` runs before the new resource is built; `after` runs once the attempt completed,
/// with `true` if a new resource was installed. `after` is not called when building failed. The close
/// callback set with [RefreshListener::on_close] runs on the thread that closed the manager.
///
/// Listener code must not call the refresh methods of the same manager, and must not panic.
pub struct RefreshListener {
    before: Box<dyn Fn() + Send + Sync>,
    after: Box<dyn Fn(bool) + Send + Sync>,
    closed: Box<dyn Fn() + Send + Sync>,
}

impl Debug for RefreshListener {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("RefreshListener")
    }
}

impl RefreshListener {
    /// Create a listener from a pair of callbacks.
    pub fn new<B, A>(before: B, after: A) -> Self
    where
        B: Fn() + Send + Sync + 'static,
        A: Fn(bool) + Send + Sync + 'static,
    {
        Self {
            before: Box::new(before),
            after: Box::new(after),
            closed: Box::new(|| ()),
        }
    }

    /// Create a listener that is only interested in the outcome of refreshes.
    pub fn after_refresh<A>(after: A) -> Self
    where
        A: Fn(bool) + Send + Sync + 'static,
    {
        Self::new(|| (), after)
    }

    /// Also call `closed` when the manager this listener is registered with is closed.
    pub fn on_close<C>(mut self, closed: C) -> Self
    where
        C: Fn() + Send + Sync + 'static,
    {
        self.closed = Box::new(closed);
        self
    }
}

/// Utility class to safely share instances of a certain type across multiple threads, while periodically
/// refreshing them.
///
/// The manager holds exactly one current resource. [ReferenceManager::acquire] hands out the current resource
/// with its reference count incremented; every acquired resource must be given back with
/// [ReferenceManager::release] (or acquire through [ReferenceManager::acquire_guard] and let the guard do it).
/// A refresh builds a newer resource with the injected [RefreshStrategy], publishes it atomically, and gives up
/// the manager's reference on the old one, which is disposed as soon as its last holder releases it.
///
/// At most one refresh runs at a time. Acquiring and releasing never wait for a refresh, and
/// [ReferenceManager::close] never waits for one either: a refresh that completes after the manager was closed
/// discards what it built.
pub struct ReferenceManager<G: ManagedResource> {
    current: ArcSwapOption<G>,
    swap_lock: Mutex<()>,
    refresh_lock: Mutex<()>,

    /// Every resource this manager has made current that still has references.
    published: Mutex<Vec<Weak<G>>>,
    strategy: Box<dyn RefreshStrategy<G>>,
    listeners: Mutex<Vec<(ListenerId, Arc<RefreshListener>)>>,
    next_listener_id: AtomicU64,
}

impl<G: ManagedResource + Debug> Debug for ReferenceManager<G> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ReferenceManager").field("current", &self.current.load_full()).finish()
    }
}

impl<G: ManagedResource> ReferenceManager<G> {
    /// Create a manager whose first current resource is `initial`. The manager takes over the reference
    /// `initial` carries.
    pub fn new<S>(initial: Arc<G>, strategy: S) -> Self
    where
        S: RefreshStrategy<G> + 'static,
    {
        let published = vec![Arc::downgrade(&initial)];
        Self {
            current: ArcSwapOption::from(Some(initial)),
            swap_lock: Mutex::new(()),
            refresh_lock: Mutex::new(()),
            published: Mutex::new(published),
            strategy: Box::new(strategy),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
        }
    }

    fn closed_error() -> LuceneError {
        LuceneError::AlreadyClosed(REFERENCE_MANAGER_IS_CLOSED_MSG.to_string())
    }

    fn ensure_open(&self) -> LuceneResult<()> {
        if self.current.load().is_none() {
            Err(Self::closed_error())
        } else {
            Ok(())
        }
    }

    /// Returns `true` once [ReferenceManager::close] has been called.
    pub fn is_closed(&self) -> bool {
        self.current.load().is_none()
    }

    /// Obtain the current resource. You must match every call to acquire with one call to
    /// [ReferenceManager::release]; it's best to do so in a guard or right after you are done with it.
    ///
    /// Fails with [LuceneError::AlreadyClosed] once the manager is closed, and with
    /// [LuceneError::IllegalState] if the current resource was disposed behind the manager's back (its
    /// reference count was decremented outside of the manager).
    pub fn acquire(&self) -> LuceneResult<Arc<G>> {
        loop {
            let Some(reference) = self.current.load_full() else {
                return Err(Self::closed_error());
            };

            if reference.try_inc_ref() {
                return Ok(reference);
            }

            if reference.ref_count() <= 0 && self.is_current(&reference) {
                return Err(LuceneError::IllegalState(
                    "the managed reference has already been disposed; this is likely a bug where the reference count was modified outside of the ReferenceManager".to_string(),
                ));
            }

            // A refresh replaced the resource between our load and try_inc_ref; try the new one.
        }
    }

    /// Like [ReferenceManager::acquire], but returns a guard that releases the resource when dropped.
    pub fn acquire_guard(&self) -> LuceneResult<ReferenceGuard<'_, G>> {
        Ok(ReferenceGuard {
            manager: self,
            reference: self.acquire()?,
            released: false,
        })
    }

    /// Release the reference previously obtained via [ReferenceManager::acquire].
    ///
    /// Fails with [LuceneError::IllegalState] if the resource was never published by this manager, or has no
    /// references left because it was released more often than it was acquired.
    pub fn release(&self, reference: &Arc<G>) -> LuceneResult<()> {
        let known = self.published.lock().iter().any(|published| is_same(published, reference));
        if !known {
            return Err(LuceneError::IllegalState(format!(
                "version {:?} was not acquired from this ReferenceManager",
                reference.version()
            )));
        }

        self.dec_ref_published(reference)
    }

    /// Gives back a reference on a published resource, forgetting it once it has been disposed.
    fn dec_ref_published(&self, reference: &Arc<G>) -> LuceneResult<()> {
        let result = reference.dec_ref();
        if reference.ref_count() <= 0 {
            self.published.lock().retain(|published| !is_same(published, reference));
        }
        result
    }

    /// Returns `true` if `reference` is the resource currently published by this manager.
    pub fn is_current(&self, reference: &G) -> bool {
        self.current.load().as_ref().map_or(false, |current| std::ptr::eq(current.as_ref(), reference))
    }

    /// You must call this (or [ReferenceManager::maybe_refresh_blocking]) periodically if you want
    /// [ReferenceManager::acquire] to return new resources.
    ///
    /// Only one thread refreshes at a time. If another thread is currently refreshing, this returns `Ok(false)`
    /// immediately without doing any work. Otherwise it returns `Ok(true)` if a new resource was installed and
    /// `Ok(false)` if there was nothing new.
    ///
    /// If building the new resource fails, the error is returned and the old resource stays current.
    pub fn maybe_refresh(&self) -> LuceneResult<bool> {
        self.ensure_open()?;

        match self.refresh_lock.try_lock() {
            Some(_guard) => self.do_maybe_refresh(),
            None => Ok(false),
        }
    }

    /// Like [ReferenceManager::maybe_refresh], but waits for an in-flight refresh to finish instead of
    /// returning. When this returns, a refresh attempt that started after the call has completed.
    pub fn maybe_refresh_blocking(&self) -> LuceneResult<bool> {
        self.ensure_open()?;

        let _guard = self.refresh_lock.lock();
        self.do_maybe_refresh()
    }

    /// Must be called with the refresh lock held.
    fn do_maybe_refresh(&self) -> LuceneResult<bool> {
        let reference = self.acquire()?;
        self.notify_before_refresh();

        let outcome = self.refresh_from(&reference);
        let released = self.release(&reference);
        let refreshed = outcome?;

        self.notify_after_refresh(refreshed);
        self.strategy.after_maybe_refresh()?;
        released?;

        Ok(refreshed)
    }

    fn refresh_from(&self, reference: &Arc<G>) -> LuceneResult<bool> {
        let Some(candidate) = self.strategy.refresh_if_needed(reference)? else {
            return Ok(false);
        };

        if candidate.version() == reference.version() {
            debug!("Refresh produced version {:?} again; discarding it", candidate.version());
            candidate.dec_ref()?;
            return Ok(false);
        }

        if let Err(e) = self.install(Arc::clone(&candidate)) {
            debug!("Discarding version {:?}: {e}", candidate.version());
            if let Err(release_err) = candidate.dec_ref() {
                error!("Failed to release discarded version {:?}: {release_err}", candidate.version());
            }
            return Err(e);
        }

        debug!("Installed version {:?} (replacing {:?})", candidate.version(), reference.version());
        Ok(true)
    }

    fn install(&self, candidate: Arc<G>) -> LuceneResult<()> {
        let _guard = self.swap_lock.lock();
        self.ensure_open()?;

        {
            let mut published = self.published.lock();
            published.retain(|entry| entry.upgrade().map_or(false, |resource| resource.ref_count() > 0));
            published.push(Arc::downgrade(&candidate));
        }

        if let Some(old) = self.current.swap(Some(candidate)) {
            if let Err(e) = self.dec_ref_published(&old) {
                error!("Failed to release superseded version {:?}: {e}", old.version());
            }
        }
        Ok(())
    }

    /// Closes this manager, releasing its reference on the current resource. Further calls to
    /// [ReferenceManager::acquire] and the refresh methods fail with [LuceneError::AlreadyClosed]. Resources
    /// that were already acquired remain valid until they are released.
    ///
    /// Closing does not wait for an in-flight refresh, and runs the listeners' close callbacks once. Closing
    /// more than once is a no-op.
    pub fn close(&self) {
        {
            let _guard = self.swap_lock.lock();
            let Some(old) = self.current.swap(None) else {
                return;
            };

            debug!("Closing ReferenceManager; releasing version {:?}", old.version());
            if let Err(e) = self.dec_ref_published(&old) {
                error!("Failed to release version {:?} on close: {e}", old.version());
            }
        }

        self.strategy.after_close();
        for listener in self.listener_snapshot() {
            (listener.closed)();
        }
    }

    /// Adds a listener, to be notified when a refresh attempt starts and completes.
    pub fn add_listener(&self, listener: RefreshListener) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener added with [ReferenceManager::add_listener]. Returns `false` if it was not
    /// registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    fn listener_snapshot(&self) -> Vec<Arc<RefreshListener>> {
        self.listeners.lock().iter().map(|(_, listener)| Arc::clone(listener)).collect()
    }

    fn notify_before_refresh(&self) {
        for listener in self.listener_snapshot() {
            (listener.before)();
        }
    }

    fn notify_after_refresh(&self, did_refresh: bool) {
        for listener in self.listener_snapshot() {
            (listener.after)(did_refresh);
        }
    }
}

fn is_same<G>(published: &Weak<G>, reference: &Arc<G>) -> bool {
    std::ptr::eq(published.as_ptr(), Arc::as_ptr(reference))
}

impl<G: ManagedResource> Drop for ReferenceManager<G> {
    fn drop(&mut self) {
        self.close();
    }
}

/// An acquired resource that is released back to its [ReferenceManager] when dropped.
pub struct ReferenceGuard<'a, G: ManagedResource> {
    manager: &'a ReferenceManager<G>,
    reference: Arc<G>,
    released: bool,
}

impl<G: ManagedResource> ReferenceGuard<'_, G> {
    /// Returns the acquired resource.
    #[inline]
    pub fn resource(&self) -> &Arc<G> {
        &self.reference
    }

    /// Releases the resource now, reporting any failure instead of logging it.
    pub fn release(mut self) -> LuceneResult<()> {
        self.released = true;
        self.manager.release(&self.reference)
    }
}

impl<G: ManagedResource> Deref for ReferenceGuard<'_, G> {
    type Target = G;

    fn deref(&self) -> &G {
        self.resource()
    }
}

impl<G: ManagedResource> Drop for ReferenceGuard<'_, G> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.manager.release(&self.reference) {
                error!("Failed to release version {:?}: {e}", self.reference.version());
            }
        }
    }
}
