//! VLAN Manager integration
//!
//! This library provides:
//! - An HTTP client for the read-only VLAN Manager API
//! - The transformer that turns raw segments into validated cluster records

pub mod client;
pub mod error;
pub mod transform;

pub use client::{SegmentSource, VlanClient};
pub use error::VlanError;
pub use transform::{TransformOutput, Transformer};
