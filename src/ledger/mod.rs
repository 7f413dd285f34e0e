pub mod models;
pub mod repository;
pub mod service;

pub use repository::LedgerRepository;
pub use service::LedgerService;
