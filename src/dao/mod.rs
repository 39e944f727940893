/// Database model definitions.
pub mod models;
/// Join code allocation.
pub mod room_code;
/// Room and question persistence backends.
pub mod room_store;
/// Storage abstraction layer for database operations.
pub mod storage;
