pub mod error_kind;
pub mod store_error;

pub use error_kind::ErrorKind;
pub use store_error::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;
