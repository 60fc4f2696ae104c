mod controlled_real_time_reopen_thread;
mod index_searcher;
mod reader_cache;
mod reference_manager;
mod searcher_factory;
mod searcher_lifetime_manager;
mod searcher_manager;

pub use {
    controlled_real_time_reopen_thread::*, index_searcher::*, reader_cache::*, reference_manager::*,
    searcher_factory::*, searcher_lifetime_manager::*, searcher_manager::*,
};
