//! Batch writers: the buffered share pipeline and the generic multi-row insert.

pub mod generic;
pub mod share_writer;
pub mod statement;
mod stats;

pub use generic::GenericBatchWriter;
pub use share_writer::ShareBatchWriter;
