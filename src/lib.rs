pub mod annotate;
pub mod errors;
pub mod file;
pub mod gradients;
pub mod layout;
pub mod provenance;
pub mod tools;
pub mod transcode;

pub use layout::*;
pub use provenance::*;
pub use transcode::*;
