//! Source connector for the HIS feeds.

pub mod connector;
pub mod feeds;

pub use connector::*;
pub use feeds::*;
