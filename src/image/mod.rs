//! Image preparation before upload
//!
//! Images are always stored as JPEG; other still formats are re-encoded so
//! the object key extension and content type stay truthful.

pub mod mime;
pub mod normalize;

pub use mime::detect_image_format;
pub use normalize::normalize_image;
