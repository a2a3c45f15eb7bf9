mod error;
pub use error::*;

mod forward;
pub use forward::*;

mod identity;
pub use identity::*;

mod server;
pub use server::*;
