pub mod net;
pub mod serde_ext;
pub mod time;
