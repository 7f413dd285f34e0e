pub mod missing;
pub mod models;
pub mod repository;
pub mod sync;

pub use models::{LocalOrder, OrderSource};
pub use repository::OrderRepository;
pub use sync::ChainSyncService;
