//! CLI commands implementation

pub mod extract;
pub mod init;
pub mod products;
pub mod status;
pub mod users;

pub use extract::*;
pub use init::*;
pub use products::*;
pub use status::*;
pub use users::*;
