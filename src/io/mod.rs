pub mod config_io;
pub mod file_store;
pub mod gateway;
pub mod lock;
pub mod store;
pub mod url_state;
pub mod watcher;
