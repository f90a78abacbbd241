pub mod share_writer;

pub use share_writer::IShareWriter;
