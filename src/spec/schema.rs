use crate::prelude::Result;
use serde_json::Value;

/// Shape of the value a builder writes into the spec tree.
///
#[derive(Debug, Clone, Copy)]
pub enum Kind {
    /// String, number or boolean, assigned as given.
    Scalar,
    /// ISO-8601 string or epoch seconds.
    Timestamp,
    /// IP address, either `"addr[/prefix]"` or an `{value, prefix_length}`
    /// object, stored as `{ipv4|ipv6: {value, prefix_length}}`.
    IpAddress,
    /// Free-form object, assigned as given.
    Map,
    /// Typed child object with its own entries.
    Object(&'static [Entry]),
    /// List whose elements are built with the inner kind.
    List(&'static Kind),
}

/// Custom builder writing `value` somewhere into `spec`.
pub type BuildFn = fn(&mut Value, &Value) -> Result<()>;

#[derive(Debug, Clone, Copy)]
pub enum Builder {
    /// Writes the built value at a dotted path of the spec.
    Field { path: &'static str, kind: Kind },
    Custom(BuildFn),
}

/// Maps one user parameter to the spec region it populates.
///
#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub param: &'static str,
    pub builder: Builder,
}

impl Entry {
    /// Parameter written under the same name.
    ///
    pub const fn field(param: &'static str, kind: Kind) -> Self {
        Self::at(param, param, kind)
    }

    pub const fn at(param: &'static str, path: &'static str, kind: Kind) -> Self {
        Self {
            param,
            builder: Builder::Field { path, kind },
        }
    }

    pub const fn custom(param: &'static str, build: BuildFn) -> Self {
        Self {
            param,
            builder: Builder::Custom(build),
        }
    }
}

/// Builder table of one resource.
///
/// # Fields
///
/// * `entries`: Parameter builders, looked up by parameter name.
/// * `read_only`: Dotted paths the server owns; stripped before comparison
///   and before the spec is sent back.
/// * `ignored`: Dotted paths that do not take part in idempotency checks,
///   such as secrets the server never echoes.
///
#[derive(Debug, Clone, Copy)]
pub struct BuilderTable {
    pub entries: &'static [Entry],
    pub read_only: &'static [&'static str],
    pub ignored: &'static [&'static str],
}

impl BuilderTable {
    pub fn entry(&self, param: &str) -> Option<&Entry> {
        find(self.entries, param)
    }
}

pub(crate) fn find<'a>(entries: &'a [Entry], param: &str) -> Option<&'a Entry> {
    entries.iter().find(|entry| entry.param == param)
}
