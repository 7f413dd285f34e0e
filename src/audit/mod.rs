pub mod models;
pub mod repository;

pub use models::AuditLog;
pub use repository::AuditRepository;
