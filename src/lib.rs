pub mod codec;
pub mod error;
pub mod import;
pub mod store;
pub mod suggest;

pub use crate::codec::{decode, encode, Record};
pub use crate::error::StoreError;
pub use crate::import::import_csv;
pub use crate::store::{DbStore, StoreConfig};
pub use crate::suggest::find_similar;
