//! Page raster addressing
//!
//! Page images are produced and listed by an external service. The client
//! only derives an image URL from a configured base and the basename of the
//! document's stored image path.

use shared_types::Document;

/// Final path segment of a stored image path, accepting either separator
pub fn image_basename(stored_path: &str) -> Option<&str> {
    let trimmed = stored_path.trim().trim_end_matches(['/', '\\']);
    let name = trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// `{base}/{basename(stored_path)}`, or `None` when the path has no basename
pub fn page_image_url(base: &str, stored_path: &str) -> Option<String> {
    let name = image_basename(stored_path)?;
    let base = base.trim().trim_end_matches('/');
    if base.is_empty() {
        return Some(format!("/{}", name));
    }
    Some(format!("{}/{}", base, name))
}

/// Image URL of a document's page raster, if it has one
pub fn document_image_url(base: &str, doc: &Document) -> Option<String> {
    doc.image_path
        .as_deref()
        .and_then(|path| page_image_url(base, path))
}
