//! Core definitions (error taxonomy, result verification, fence boundary),
//! relied upon by all mediabuf-* crates.

pub mod error;
pub mod fence;
pub mod result;

pub use result::Result;
