//! Data model of a resource file

mod manifest;

pub use manifest::*;
