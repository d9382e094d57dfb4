/// Long-term member statistics storage.
pub mod member_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
