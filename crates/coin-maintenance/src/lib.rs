pub mod gc;
pub mod report;
pub mod sweep;

pub use gc::InventoryGc;
pub use report::{Dashboard, StorageReporter};
pub use sweep::spawn_vault_sweeper;
