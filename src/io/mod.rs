pub mod config_io;
pub mod json_store;
pub mod lock;
pub mod store;
