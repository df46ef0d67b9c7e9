pub mod attendance;
pub mod backup_exchange;
pub mod classes;
pub mod core;
pub mod reports;
pub mod sessions;
pub mod students;
