pub mod pool;
pub mod server;

pub use pool::{health_check, open_pool};
pub use server::CoinInventoryServer;
