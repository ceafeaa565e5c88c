mod errors;
mod mode;
pub mod proto;

pub use errors::CoreError;
pub use mode::{RunMode, parse_flag};

pub const PROTOCOL_VERSION: u32 = 1;
