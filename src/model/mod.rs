pub mod session_id;
pub mod field;
pub mod key;
pub mod config;

pub use session_id::*;
pub use field::*;
pub use key::*;
pub use config::*;
