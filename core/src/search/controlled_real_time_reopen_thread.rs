use {
    crate::{
        index::TrackingIndexWriter,
        search::{ListenerId, ManagedResource, ReferenceManager, RefreshListener},
        LuceneError, LuceneResult,
    },
    log::{debug, error},
    parking_lot::{Condvar, Mutex},
    std::{
        fmt::{Debug, Formatter, Result as FmtResult},
        sync::{Arc, Weak},
        thread::{self, JoinHandle},
        time::{Duration, Instant},
    },
};

const DEFAULT_THREAD_NAME: &str = "ControlledRealTimeReopenThread";

#[derive(Debug, Default)]
struct ReopenState {
    /// Generation of the latest completed refresh.
    searching_gen: u64,

    /// Highest generation any caller is waiting for.
    waiting_gen: u64,

    /// Generation taken by the refresh in flight.
    refresh_start_gen: u64,

    finish: bool,
}

struct ReopenShared<G: ManagedResource> {
    writer: Arc<TrackingIndexWriter>,
    manager: Arc<ReferenceManager<G>>,
    target_max_stale: Duration,
    target_min_stale: Duration,
    state: Mutex<ReopenState>,

    /// Wakes the reopen loop.
    reopen_cond: Condvar,

    /// Wakes callers of wait_for_generation.
    generation_cond: Condvar,
}

impl<G: ManagedResource> ReopenShared<G> {
    fn before_refresh(&self) {
        self.state.lock().refresh_start_gen = self.writer.get_and_increment_generation();
    }

    fn after_refresh(&self) {
        let mut state = self.state.lock();
        state.searching_gen = state.refresh_start_gen;
        self.generation_cond.notify_all();
    }

    fn finish(&self, state: &mut ReopenState) {
        state.finish = true;
        self.reopen_cond.notify_all();
        self.generation_cond.notify_all();
    }

    /// Returns `true` once the thread was closed or the manager it reopens was closed. Must be called with
    /// the state lock held.
    fn is_finished(&self, state: &mut ReopenState) -> bool {
        if !state.finish && self.manager.is_closed() {
            self.finish(state);
        }
        state.finish
    }

    fn run(&self, name: &str) {
        debug!("{name} started");
        let mut last_reopen_start = Instant::now();

        loop {
            {
                let mut state = self.state.lock();
                loop {
                    if state.finish {
                        debug!("{name} finished");
                        return;
                    }

                    let has_waiting = state.waiting_gen > state.searching_gen;
                    let stale = if has_waiting {
                        self.target_min_stale
                    } else {
                        self.target_max_stale
                    };

                    match last_reopen_start.checked_add(stale) {
                        Some(next_reopen_start) if Instant::now() >= next_reopen_start => break,
                        Some(next_reopen_start) => {
                            self.reopen_cond.wait_until(&mut state, next_reopen_start);
                        }
                        None => self.reopen_cond.wait(&mut state),
                    }
                }
            }

            last_reopen_start = Instant::now();
            match self.manager.maybe_refresh_blocking() {
                Ok(refreshed) => debug!("{name} refresh completed (refreshed={refreshed})"),
                Err(e) if e.is_already_closed() => {
                    debug!("{name} stopping: {e}");
                    let mut state = self.state.lock();
                    self.finish(&mut state);
                    return;
                }
                Err(e) => error!("{name} refresh failed; retrying on next wake: {e}"),
            }
        }
    }
}

/// Utility class that runs a thread to manage periodic reopens of a [ReferenceManager], with methods to wait
/// for specific index changes to become visible.
///
/// To use this class you must first wrap your [crate::index::IndexWriter] with a [TrackingIndexWriter] and
/// always use it to make changes to the index, saving the returned generation. Then, when a given search
/// request needs to see a specific index change, call [ControlledRealTimeReopenThread::wait_for_generation] to
/// wait for that change to be visible.
///
/// The thread refreshes at least every `target_max_stale`. While a caller is waiting for a generation, it
/// refreshes as soon as `target_min_stale` has passed since the previous refresh started. Refreshes made by
/// any other thread through the same manager also satisfy waiters.
pub struct ControlledRealTimeReopenThread<G: ManagedResource> {
    shared: Arc<ReopenShared<G>>,
    name: String,
    listener_id: ListenerId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<G: ManagedResource> Debug for ControlledRealTimeReopenThread<G> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let state = self.shared.state.lock();
        f.debug_struct("ControlledRealTimeReopenThread")
            .field("name", &self.name)
            .field("target_max_stale", &self.shared.target_max_stale)
            .field("target_min_stale", &self.shared.target_min_stale)
            .field("state", &*state)
            .finish()
    }
}

impl<G: ManagedResource> ControlledRealTimeReopenThread<G> {
    /// Create a `ControlledRealTimeReopenThread` to periodically reopen `manager`, and start it.
    ///
    /// `target_max_stale` is the maximum time until a change becomes visible when nobody is waiting for it;
    /// `target_min_stale` is the minimum time between reopens while somebody is waiting. Fails with
    /// [LuceneError::IllegalArgument] if `target_max_stale < target_min_stale`.
    pub fn new(
        writer: Arc<TrackingIndexWriter>,
        manager: Arc<ReferenceManager<G>>,
        target_max_stale: Duration,
        target_min_stale: Duration,
    ) -> LuceneResult<Self> {
        Self::with_name(writer, manager, target_max_stale, target_min_stale, DEFAULT_THREAD_NAME)
    }

    /// Like [ControlledRealTimeReopenThread::new], naming the spawned thread `name`.
    pub fn with_name(
        writer: Arc<TrackingIndexWriter>,
        manager: Arc<ReferenceManager<G>>,
        target_max_stale: Duration,
        target_min_stale: Duration,
        name: impl Into<String>,
    ) -> LuceneResult<Self> {
        if target_max_stale < target_min_stale {
            return Err(LuceneError::IllegalArgument(format!(
                "target_max_stale ({target_max_stale:?}) must be >= target_min_stale ({target_min_stale:?})"
            )));
        }

        let shared = Arc::new(ReopenShared {
            writer,
            manager,
            target_max_stale,
            target_min_stale,
            state: Mutex::new(ReopenState::default()),
            reopen_cond: Condvar::new(),
            generation_cond: Condvar::new(),
        });

        let listener_id = {
            let before: Weak<ReopenShared<G>> = Arc::downgrade(&shared);
            let (after, closed) = (Weak::clone(&before), Weak::clone(&before));
            let listener = RefreshListener::new(
                move || {
                    if let Some(shared) = before.upgrade() {
                        shared.before_refresh();
                    }
                },
                move |_| {
                    if let Some(shared) = after.upgrade() {
                        shared.after_refresh();
                    }
                },
            )
            .on_close(move || {
                if let Some(shared) = closed.upgrade() {
                    debug!("Manager closed; failing generation waiters");
                    let mut state = shared.state.lock();
                    shared.finish(&mut state);
                }
            });
            shared.manager.add_listener(listener)
        };

        let name = name.into();
        let handle = {
            let shared = Arc::clone(&shared);
            let thread_name = name.clone();
            thread::Builder::new().name(name.clone()).spawn(move || shared.run(&thread_name))
        };

        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                shared.manager.remove_listener(listener_id);
                return Err(LuceneError::IllegalState(format!("unable to start {name}: {e}")));
            }
        };

        Ok(Self {
            shared,
            name,
            listener_id,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Waits for the target generation to become visible in the searcher. If the current searcher is older
    /// than the target generation, this method will block until the searcher is reopened, by another thread
    /// or via this thread's periodic reopen.
    ///
    /// Fails with [LuceneError::IllegalArgument] if `target_gen` was never returned by the writer, and with
    /// [LuceneError::AlreadyClosed] if this thread or its manager is closed before the generation becomes
    /// visible.
    pub fn wait_for_generation(&self, target_gen: u64) -> LuceneResult<()> {
        self.wait(target_gen, None).map(|_| ())
    }

    /// Like [ControlledRealTimeReopenThread::wait_for_generation], but gives up after `timeout`.
    ///
    /// Returns `Ok(true)` if the generation became visible and `Ok(false)` if the timeout elapsed first.
    pub fn wait_for_generation_timeout(&self, target_gen: u64, timeout: Duration) -> LuceneResult<bool> {
        self.wait(target_gen, Some(timeout))
    }

    fn wait(&self, target_gen: u64, timeout: Option<Duration>) -> LuceneResult<bool> {
        let current_gen = self.shared.writer.generation();
        if target_gen > current_gen {
            return Err(LuceneError::IllegalArgument(format!(
                "target_gen={target_gen} was never returned by the TrackingIndexWriter (current gen={current_gen})"
            )));
        }

        // A timeout too large to represent is the same as no timeout.
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));

        let mut state = self.shared.state.lock();
        if self.shared.is_finished(&mut state) {
            return Err(self.closed_error());
        }

        if target_gen <= state.searching_gen {
            return Ok(true);
        }

        state.waiting_gen = state.waiting_gen.max(target_gen);
        self.shared.reopen_cond.notify_all();

        while target_gen > state.searching_gen {
            if self.shared.is_finished(&mut state) {
                return Err(self.closed_error());
            }

            match deadline {
                None => self.shared.generation_cond.wait(&mut state),
                Some(deadline) => {
                    if self.shared.generation_cond.wait_until(&mut state, deadline).timed_out() {
                        if self.shared.is_finished(&mut state) {
                            return Err(self.closed_error());
                        }
                        return Ok(target_gen <= state.searching_gen);
                    }
                }
            }
        }

        Ok(true)
    }

    /// Returns the generation reflected by the most recent refresh of the manager.
    pub fn searching_generation(&self) -> u64 {
        self.shared.state.lock().searching_gen
    }

    /// Returns the maximum staleness allowed when nobody is waiting.
    #[inline]
    pub fn target_max_stale(&self) -> Duration {
        self.shared.target_max_stale
    }

    /// Returns the minimum time between reopens while somebody is waiting.
    #[inline]
    pub fn target_min_stale(&self) -> Duration {
        self.shared.target_min_stale
    }

    /// Returns the name of the reopen thread.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` once the thread has been asked to stop, either by [ControlledRealTimeReopenThread::close]
    /// or because the manager was closed.
    pub fn is_closed(&self) -> bool {
        let mut state = self.shared.state.lock();
        self.shared.is_finished(&mut state)
    }

    /// Stops the reopen thread and waits for it to exit. Callers blocked in
    /// [ControlledRealTimeReopenThread::wait_for_generation] fail with [LuceneError::AlreadyClosed]. Does not
    /// close the manager. Closing more than once is a no-op.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock();
            self.shared.finish(&mut state);
        }

        let Some(handle) = self.handle.lock().take() else {
            return;
        };

        if handle.thread().id() != thread::current().id() && handle.join().is_err() {
            error!("{} panicked", self.name);
        }

        self.shared.manager.remove_listener(self.listener_id);
        debug!("{} closed", self.name);
    }

    fn closed_error(&self) -> LuceneError {
        LuceneError::AlreadyClosed(format!("{} is closed", self.name))
    }
}

impl<G: ManagedResource> Drop for ControlledRealTimeReopenThread<G> {
    fn drop(&mut self) {
        self.close();
    }
}
