mod reader;
mod snapshot_source;
mod term;
mod tracking_index_writer;
mod writer;

pub use {reader::*, snapshot_source::*, term::*, tracking_index_writer::*, writer::*};
