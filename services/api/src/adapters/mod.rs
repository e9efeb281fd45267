pub mod db;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod storage;

pub use db::DbAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use memory::InMemoryDb;
pub use storage::LocalAssetStorage;
