//! Request handlers.

pub mod artifact;
pub mod clips;
pub mod demo;
pub mod health;
pub mod videos;

pub use clips::*;
pub use demo::*;
pub use health::*;
pub use videos::*;
