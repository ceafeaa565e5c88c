mod error;
mod rpc;
mod types;

pub use error::*;
pub use rpc::*;
pub use types::*;
