pub mod framing;
pub mod socket;
