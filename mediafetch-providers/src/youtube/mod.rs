//! YouTube platform.
//!
//! The native tool handles YouTube directly; mirror sites are not used.

mod descriptor;

pub use descriptor::youtube_descriptor;
