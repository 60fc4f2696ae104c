use {
    lucene_nrt::{
        document::{Document, Field},
        index::{DirectoryReader, IndexWriter, Term, TrackingIndexWriter},
        search::{
            ControlledRealTimeReopenThread, DefaultSearcherFactory, IndexSearcher, RefreshListener, SearcherManager,
        },
        BoxResult,
    },
    pretty_assertions::assert_eq,
    rand::{distributions::Alphanumeric, Rng},
    std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread,
        time::{Duration, Instant},
    },
    test_log::test,
};

fn nrt_setup(apply_all_deletes: bool) -> (Arc<IndexWriter>, Arc<TrackingIndexWriter>, SearcherManager) {
    let writer = Arc::new(IndexWriter::default());
    let manager =
        SearcherManager::from_writer(Arc::clone(&writer), apply_all_deletes, Arc::new(DefaultSearcherFactory)).unwrap();
    let tracking = Arc::new(TrackingIndexWriter::new(Arc::clone(&writer)));
    (writer, tracking, manager)
}

#[test]
fn listener_called() {
    let (writer, _, manager) = nrt_setup(true);
    let after_refresh_called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&after_refresh_called);
    manager.add_listener(RefreshListener::after_refresh(move |did_refresh| {
        if did_refresh {
            flag.store(true, Ordering::SeqCst);
        }
    }));

    writer.add_document(Document::new()).unwrap();
    writer.commit().unwrap();
    assert!(!after_refresh_called.load(Ordering::SeqCst));
    manager.maybe_refresh_blocking().unwrap();
    assert!(after_refresh_called.load(Ordering::SeqCst));
}

#[test]
fn added_document_becomes_visible_within_max_stale() {
    let (_, writer, manager) = nrt_setup(true);
    let max_stale = Duration::from_secs(20);
    let reopen =
        ControlledRealTimeReopenThread::new(Arc::clone(&writer), manager.reference_manager(), max_stale, Duration::ZERO)
            .unwrap();

    let content: String = rand::thread_rng().sample_iter(&Alphanumeric).take(256).map(char::from).collect();
    let mut commit_threads = Vec::new();

    for i in 0..200 {
        if i > 0 && i % 50 == 0 {
            let index_writer = Arc::clone(writer.index_writer());
            commit_threads.push(thread::spawn(move || index_writer.commit().unwrap()));
        }

        let doc = Document::new().with(Field::text("count", i.to_string())).with(Field::text("content", content.as_str()));
        let start = Instant::now();
        let generation = writer.add_document(doc).unwrap();
        reopen.wait_for_generation(generation).unwrap();
        assert!(start.elapsed() < max_stale, "waited too long for generation {generation}");

        let searcher = manager.acquire_guard().unwrap();
        assert_eq!(searcher.search(&Term::new("count", i.to_string()), 10).total_hits, 1);
    }

    for commit_thread in commit_threads {
        commit_thread.join().unwrap();
    }
    reopen.close();
}

/// A waiter must be satisfied by refreshes that other threads make through the manager, even when the reopen
/// thread itself would not refresh for a long time.
#[test]
fn external_refresh_satisfies_waiters() {
    let (_, writer, manager) = nrt_setup(false);
    writer.add_document(Document::new().with(Field::text("test", "test"))).unwrap();
    manager.maybe_refresh().unwrap();

    let last_gen = writer
        .update_document(Term::new("foo", "bar"), Document::new().with(Field::text("test", "test")))
        .unwrap();
    // The delete is still buffered.
    assert!(!manager.is_searcher_current().unwrap());

    let reopen = Arc::new(
        ControlledRealTimeReopenThread::new(
            Arc::clone(&writer),
            manager.reference_manager(),
            Duration::from_secs(60),
            Duration::from_secs(60),
        )
        .unwrap(),
    );

    let finished = Arc::new(AtomicBool::new(false));
    let waiter = {
        let (reopen, finished) = (Arc::clone(&reopen), Arc::clone(&finished));
        thread::spawn(move || {
            reopen.wait_for_generation(last_gen).unwrap();
            finished.store(true, Ordering::SeqCst);
        })
    };

    let deadline = Instant::now() + Duration::from_secs(1);
    while !finished.load(Ordering::SeqCst) && Instant::now() < deadline {
        manager.maybe_refresh().unwrap();
        thread::sleep(Duration::from_millis(5));
    }
    assert!(finished.load(Ordering::SeqCst), "thread deadlocked on wait_for_generation");
    waiter.join().unwrap();

    let searcher = manager.acquire_guard().unwrap();
    assert_eq!(searcher.reader().num_docs(), 2);
    reopen.close();
}

#[test]
fn concurrent_waiters_see_their_generation() {
    const THREADS: usize = 3;
    let (_, writer, manager) = nrt_setup(true);
    let manager = Arc::new(manager);

    writer.add_document(Document::new().with(Field::string("name", "Doc1"))).unwrap();
    let generation = writer.add_document(Document::new().with(Field::string("name", "Doc2"))).unwrap();

    let min_stale = Duration::from_millis(200);
    let reopen = Arc::new(
        ControlledRealTimeReopenThread::with_name(
            Arc::clone(&writer),
            manager.reference_manager(),
            Duration::from_secs(2),
            min_stale,
            "Controlled Real Time Reopen Thread",
        )
        .unwrap(),
    );

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let (reopen, manager) = (Arc::clone(&reopen), Arc::clone(&manager));
            thread::spawn(move || {
                let start = Instant::now();
                reopen.wait_for_generation(generation).unwrap();
                let waited = start.elapsed();
                let num_docs = manager.acquire_guard().unwrap().reader().num_docs();
                (num_docs, waited)
            })
        })
        .collect();

    for worker in workers {
        let (num_docs, waited) = worker.join().unwrap();
        assert_eq!(num_docs, 2);
        assert!(waited <= min_stale + Duration::from_secs(1), "waited {waited:?}");
    }

    reopen.close();
    assert!(reopen.is_closed());
}

#[test]
fn generation_five_scenario() {
    let (_, writer, manager) = nrt_setup(true);
    for _ in 0..4 {
        writer.add_document(Document::new().with(Field::string("id", "old"))).unwrap();
        writer.get_and_increment_generation();
    }
    let generation = writer.add_document(Document::new().with(Field::string("id", "new"))).unwrap();
    assert_eq!(generation, 5);

    let max_stale = Duration::from_millis(200);
    let reopen =
        ControlledRealTimeReopenThread::new(Arc::clone(&writer), manager.reference_manager(), max_stale, max_stale)
            .unwrap();

    let start = Instant::now();
    reopen.wait_for_generation(generation).unwrap();
    assert!(start.elapsed() < max_stale + Duration::from_secs(1));
    assert_eq!(manager.acquire_guard().unwrap().count(&Term::new("id", "new")), 1);
}

#[test]
fn evil_searcher_factory() {
    let writer = Arc::new(IndexWriter::default());
    writer.commit().unwrap();
    let other = IndexWriter::default().open_reader(true).unwrap();

    let evil = move |_: Arc<DirectoryReader>, _: Option<&Arc<DirectoryReader>>| -> BoxResult<IndexSearcher> {
        Ok(IndexSearcher::new(Arc::clone(&other)))
    };

    let e = SearcherManager::from_writer(writer, false, Arc::new(evil)).unwrap_err();
    assert!(e.is_illegal_state(), "unexpected error: {e}");
}
