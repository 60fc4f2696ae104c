use {
    lucene_nrt::{
        document::{Document, Field},
        index::{DirectoryReader, IndexWriter, Term},
        search::{
            DefaultSearcherFactory, IndexSearcher, ManagedResource, PruneByAge, ReaderCache, SearcherLifetimeManager,
            SearcherManager,
        },
        BoxResult, LuceneError,
    },
    parking_lot::Mutex,
    pretty_assertions::assert_eq,
    rand::Rng,
    std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            mpsc, Arc, Barrier,
        },
        thread,
        time::{Duration, Instant},
    },
    test_log::test,
};

fn doc(id: usize) -> Document {
    Document::new().with(Field::string("id", id.to_string())).with(Field::text("body", "united states"))
}

/// Counts how often each reader opened by the manager is disposed.
#[derive(Clone, Default)]
struct DisposalLog {
    disposals: Arc<Mutex<HashMap<lucene_nrt::Id, usize>>>,
}

impl DisposalLog {
    fn factory(&self) -> impl Fn(Arc<DirectoryReader>, Option<&Arc<DirectoryReader>>) -> BoxResult<IndexSearcher> {
        let disposals = Arc::clone(&self.disposals);
        move |reader: Arc<DirectoryReader>, _: Option<&Arc<DirectoryReader>>| -> BoxResult<IndexSearcher> {
            disposals.lock().insert(reader.id(), 0);
            let disposals = Arc::clone(&disposals);
            reader.add_closed_listener(move |id| *disposals.lock().entry(id).or_default() += 1)?;
            Ok(IndexSearcher::new(reader))
        }
    }
}

#[test]
fn stuck_warm_up_racing_close() {
    let writer = Arc::new(IndexWriter::default());
    let entered = Arc::new(Barrier::new(2));
    let (unblock_tx, unblock_rx) = mpsc::channel::<()>();
    let unblock_rx = Mutex::new(unblock_rx);
    let stall = Arc::new(AtomicBool::new(false));
    let warmed: Arc<Mutex<Vec<Arc<DirectoryReader>>>> = Arc::default();

    let factory = {
        let (entered, stall, warmed) = (Arc::clone(&entered), Arc::clone(&stall), Arc::clone(&warmed));
        move |reader: Arc<DirectoryReader>, _: Option<&Arc<DirectoryReader>>| -> BoxResult<IndexSearcher> {
            warmed.lock().push(Arc::clone(&reader));
            if stall.load(Ordering::SeqCst) {
                entered.wait();
                unblock_rx.lock().recv().ok();
            }
            Ok(IndexSearcher::new(reader))
        }
    };

    let manager = Arc::new(SearcherManager::from_writer(Arc::clone(&writer), true, Arc::new(factory)).unwrap());
    writer.add_document(doc(1)).unwrap();
    stall.store(true, Ordering::SeqCst);

    let refresher = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.maybe_refresh())
    };

    entered.wait();
    let start = Instant::now();
    manager.close();
    assert!(start.elapsed() < Duration::from_secs(1), "close waited for the stuck warm-up");
    assert!(manager.acquire().unwrap_err().is_already_closed());

    unblock_tx.send(()).unwrap();
    match refresher.join().unwrap() {
        Err(LuceneError::AlreadyClosed(_)) => (),
        other => panic!("unexpected refresh result: {other:?}"),
    }

    // Both the initial reader and the one built by the abandoned refresh are gone.
    let warmed = warmed.lock();
    assert_eq!(warmed.len(), 2);
    assert!(warmed.iter().all(|reader| reader.is_closed()));
}

#[test]
fn double_release_is_detected() {
    let writer = Arc::new(IndexWriter::default());
    let manager = SearcherManager::from_writer(writer, true, Arc::new(DefaultSearcherFactory)).unwrap();

    let searcher = manager.acquire().unwrap();
    manager.release(&searcher).unwrap();
    // Release again, behind the manager's back.
    manager.release(&searcher).unwrap();

    assert!(manager.acquire().unwrap_err().is_illegal_state());
    assert!(manager.release(&searcher).unwrap_err().is_illegal_state());
    manager.close();
}

#[test]
fn releasing_a_searcher_from_elsewhere_fails() {
    let writer = Arc::new(IndexWriter::default());
    let manager = SearcherManager::from_writer(writer, true, Arc::new(DefaultSearcherFactory)).unwrap();

    let stranger = Arc::new(IndexSearcher::new(IndexWriter::default().open_reader(true).unwrap()));
    assert!(manager.release(&stranger).unwrap_err().is_illegal_state());
    assert!(!stranger.reader().is_closed());

    stranger.dec_ref().unwrap();
    assert!(stranger.reader().is_closed());
    manager.close();
}

#[test]
fn concurrent_searching_while_refreshing() {
    const SEARCHERS: usize = 4;
    const DOCS: usize = 300;

    let writer = Arc::new(IndexWriter::default());
    let log = DisposalLog::default();
    let manager = Arc::new(SearcherManager::from_writer(Arc::clone(&writer), true, Arc::new(log.factory())).unwrap());
    let done = Arc::new(AtomicBool::new(false));
    let refreshes = Arc::new(AtomicUsize::new(0));

    let searchers: Vec<_> = (0..SEARCHERS)
        .map(|_| {
            let (manager, done) = (Arc::clone(&manager), Arc::clone(&done));
            thread::spawn(move || {
                let mut last_version = 0;
                while !done.load(Ordering::SeqCst) {
                    let searcher = manager.acquire_guard().unwrap();
                    assert!(!searcher.reader().is_closed());

                    // Searchers only move forward.
                    assert!(searcher.version() >= last_version);
                    assert!(searcher.count(&Term::new("body", "united")) <= searcher.reader().max_doc());
                    last_version = searcher.version();
                }
            })
        })
        .collect();

    let refreshers: Vec<_> = (0..2)
        .map(|_| {
            let (manager, done, refreshes) = (Arc::clone(&manager), Arc::clone(&done), Arc::clone(&refreshes));
            thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    if manager.maybe_refresh().unwrap() {
                        refreshes.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(rand::thread_rng().gen_range(0..3)));
                }
            })
        })
        .collect();

    for i in 0..DOCS {
        writer.add_document(doc(i)).unwrap();
        if i % 37 == 0 {
            writer.delete_documents(vec![Term::new("id", (i / 2).to_string())]).unwrap();
        }
    }

    thread::sleep(Duration::from_millis(20));
    done.store(true, Ordering::SeqCst);
    for handle in searchers.into_iter().chain(refreshers) {
        handle.join().unwrap();
    }

    manager.maybe_refresh_blocking().unwrap();
    assert_eq!(manager.acquire_guard().unwrap().reader().num_docs(), writer.num_docs());
    assert!(refreshes.load(Ordering::SeqCst) > 0);

    // Every superseded reader was disposed exactly once; only the current one is still open.
    manager.close();
    let disposals = log.disposals.lock();
    assert!(disposals.len() > 1);
    for (id, count) in disposals.iter() {
        assert_eq!(*count, 1, "reader {id:?} disposed {count} times");
    }
}

#[test]
fn lifetime_manager_keeps_pages_consistent() {
    let writer = Arc::new(IndexWriter::default());
    let manager = SearcherManager::from_writer(Arc::clone(&writer), true, Arc::new(DefaultSearcherFactory)).unwrap();
    let lifetimes = SearcherLifetimeManager::new();

    for i in 0..10 {
        writer.add_document(doc(i)).unwrap();
    }
    manager.maybe_refresh().unwrap();

    // First page: record the searcher and remember the token.
    let token = {
        let searcher = manager.acquire_guard().unwrap();
        assert_eq!(searcher.search(&Term::new("body", "states"), 5).doc_ids, vec![0, 1, 2, 3, 4]);
        lifetimes.record(searcher.resource()).unwrap()
    };

    // The index changes and the manager moves on.
    writer.delete_all().unwrap();
    manager.maybe_refresh().unwrap();
    let current = manager.acquire_guard().unwrap();
    assert_eq!(lifetimes.record(current.resource()).unwrap(), current.version());
    assert_eq!(current.count(&Term::new("body", "states")), 0);

    // Second page still runs against the recorded point in time.
    let searcher = lifetimes.acquire(token).unwrap().expect("searcher was pruned");
    let page = searcher.search(&Term::new("body", "states"), 10);
    assert_eq!(page.total_hits, 10);
    assert_eq!(&page.doc_ids[5..], &[5, 6, 7, 8, 9]);
    lifetimes.release(&searcher).unwrap();

    // Once pruned, follow-on requests fall back to the current searcher.
    thread::sleep(Duration::from_millis(20));
    lifetimes.prune(&PruneByAge::new(0.01).unwrap()).unwrap();
    assert!(lifetimes.acquire(token).unwrap().is_none());
    assert!(searcher.reader().is_closed());
    assert_eq!(lifetimes.len(), 1);

    drop(current);
    lifetimes.close();
    manager.close();
}

#[test]
fn lifetime_manager_prune_ages() {
    // Each entry's age is measured from when the next newer one was recorded.
    let writer = Arc::new(IndexWriter::default());
    let manager = SearcherManager::from_writer(Arc::clone(&writer), true, Arc::new(DefaultSearcherFactory)).unwrap();
    let lifetimes = SearcherLifetimeManager::new();

    let mut tokens = Vec::new();
    for i in 0..5 {
        writer.add_document(doc(i)).unwrap();
        manager.maybe_refresh().unwrap();
        let searcher = manager.acquire_guard().unwrap();
        tokens.push(lifetimes.record(searcher.resource()).unwrap());
        thread::sleep(Duration::from_millis(15));
    }

    let ages = Mutex::new(Vec::new());
    lifetimes
        .prune(&|age_sec: f64, is_most_recent: bool, searcher: &IndexSearcher| {
            ages.lock().push((searcher.version(), age_sec, is_most_recent));
            false
        })
        .unwrap();

    let ages = ages.into_inner();
    let versions: Vec<_> = ages.iter().map(|(version, _, _)| *version).collect();
    let mut expected = tokens.clone();
    expected.reverse();
    assert_eq!(versions, expected);
    assert!(ages[0].2 && ages[0].1 == 0.0);
    assert!(ages[1..].iter().all(|(_, _, is_most_recent)| !is_most_recent));
    assert!(ages.windows(2).skip(1).all(|pair| pair[1].1 > pair[0].1));

    lifetimes.prune(&PruneByAge::new(0.0).unwrap()).unwrap();
    assert_eq!(lifetimes.len(), 1);
    let newest = lifetimes.acquire(*tokens.last().unwrap()).unwrap().unwrap();
    lifetimes.release(&newest).unwrap();
    assert!(lifetimes.acquire(tokens[0]).unwrap().is_none());
}

#[test]
fn reader_cache_follows_searchers() {
    let writer = Arc::new(IndexWriter::default());
    let cache = Arc::new(ReaderCache::new());
    let factory = {
        let cache = Arc::clone(&cache);
        move |reader: Arc<DirectoryReader>, _: Option<&Arc<DirectoryReader>>| -> BoxResult<IndexSearcher> {
            // Warm the cache with the hit count for a popular query.
            cache.get_or_insert_with(&reader, |reader| reader.doc_freq(&Term::new("body", "united")))?;
            Ok(IndexSearcher::new(reader))
        }
    };
    let manager = SearcherManager::from_writer(Arc::clone(&writer), true, Arc::new(factory)).unwrap();
    assert_eq!(cache.len(), 1);

    writer.add_document(doc(1)).unwrap();
    manager.maybe_refresh().unwrap();
    let searcher = manager.acquire_guard().unwrap();
    assert_eq!(cache.get(searcher.reader().id()), Some(1));
    assert_eq!(cache.len(), 1);

    drop(searcher);
    manager.close();
    assert!(cache.is_empty());
}
