pub mod errors;
pub mod id;

pub use errors::{ConfigError, HuddleError};
pub use id::{new_id, SessionId};
