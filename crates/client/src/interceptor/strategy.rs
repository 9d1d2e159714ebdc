//! Serving strategy per resource class.

use super::classify::ResourceClass;

/// How an intercepted request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Not intercepted; the platform performs the request itself.
    Passthrough,
    /// Cache first, then network. Successful network responses are written
    /// to the static store and a network failure falls back to the root page.
    CacheFirstPopulate,
    /// Cache first, then network verbatim. Never writes.
    CacheFirstReadOnly,
}

impl Strategy {
    pub fn for_class(class: ResourceClass) -> Self {
        match class {
            ResourceClass::Navigation => Strategy::CacheFirstPopulate,
            ResourceClass::StaticAsset => Strategy::CacheFirstReadOnly,
            ResourceClass::Api | ResourceClass::OtherOrigin | ResourceClass::WorkerScript | ResourceClass::Other => {
                Strategy::Passthrough
            }
        }
    }
}
