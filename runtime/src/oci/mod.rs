//! Image references and the local image runtime.
//!
//! - [`reference`]: qualifies raw image strings from container specs
//! - [`resolver`]: decides whether a path segment is a registry host
//! - [`ctr`]: lists, pulls and exports images through containerd's `ctr`

pub mod ctr;
pub mod reference;
pub mod resolver;

pub use ctr::{parse_image_list, CtrRuntime, ImageRuntime};
pub use reference::{ReferenceNormalizer, DEFAULT_REGISTRY};
pub use resolver::{DomainResolver, StaticResolver, SystemResolver};
