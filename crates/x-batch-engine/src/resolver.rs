//! URI resolution seam for stylesheet imports and includes

use std::sync::Arc;

use crate::error::Result;

/// Resolves `xsl:import` / `xsl:include` targets to stylesheet text.
///
/// `href` is the attribute value as written; `base` is the URI of the
/// importing stylesheet when the engine knows it.
pub trait UriResolver: Send + Sync {
    fn resolve(&self, href: &str, base: Option<&str>) -> Result<Arc<str>>;
}
