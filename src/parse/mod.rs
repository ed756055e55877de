//! Parsing of `show` command output into structured records.
//!
//! Two passes: [`blocks`] splits raw text into logical blocks, [`fields`]
//! extracts typed fields from each block and joins VRF assignments across
//! blocks by interface name.

pub mod blocks;
pub mod fields;

pub use blocks::{Block, BlockKind};
pub use fields::{NormalizedRecord, VrfIndex};
