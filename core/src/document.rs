#[allow(clippy::module_inception)]
mod document;
mod field;

pub use {document::*, field::*};
