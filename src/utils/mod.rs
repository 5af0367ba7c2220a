//! Utility modules for the ConvoKit SDK.

pub mod version;

pub use version::{
    compare_versions, is_version_at_least, is_version_less_than, parse_version, ParsedVersion,
};
