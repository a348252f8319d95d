pub mod foundation_image;
pub mod image;
pub mod vm;
pub mod volume_group;
pub mod vpc;

// -----------------------------------------------------------------------------

use crate::ops::Module;

/// Names accepted by [`lookup`], each also available with an `_info` suffix.
pub const MODULES: &[&str] = &["vpc", "volume_group", "vm", "image", "foundation_image"];

/// Finds a module by name.
///
/// # Returns
///
/// The module and whether it was requested as its `_info` variant.
///
pub fn lookup(name: &str) -> Option<(&'static dyn Module, bool)> {
    let (base, info) = match name.strip_suffix("_info") {
        Some(base) => (base, true),
        None => (name, false),
    };
    let module: &'static dyn Module = match base {
        "vpc" => &vpc::VPC,
        "volume_group" => &volume_group::VOLUME_GROUP,
        "vm" => &vm::VM,
        "image" => &image::Image,
        "foundation_image" => &foundation_image::FoundationImage,
        _ => return None,
    };
    Some((module, info))
}
