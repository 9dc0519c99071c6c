//! Cache Key Module
//!
//! Conversion between cache keys and single path segments.

use crate::error::{CacheError, Result};
use crate::store::PATH_SEPARATOR;

// == Cache Key ==
/// A key that maps onto exactly one path segment under a namespace root.
///
/// `from_segment(to_segment(k))` must give back `k`, and distinct keys must
/// produce distinct segments.
pub trait CacheKey: Sized {
    fn to_segment(&self) -> String;

    /// Rebuilds a key from a child name found under the namespace root.
    fn from_segment(segment: &str) -> Result<Self>;
}

impl CacheKey for String {
    fn to_segment(&self) -> String {
        self.clone()
    }

    fn from_segment(segment: &str) -> Result<Self> {
        Ok(segment.to_string())
    }
}

macro_rules! integer_cache_key {
    ($($ty:ty),*) => {
        $(
            impl CacheKey for $ty {
                fn to_segment(&self) -> String {
                    self.to_string()
                }

                fn from_segment(segment: &str) -> Result<Self> {
                    segment.parse().map_err(|_| {
                        CacheError::InvalidKey(format!(
                            "'{}' is not a valid {}",
                            segment,
                            stringify!($ty)
                        ))
                    })
                }
            }
        )*
    };
}

integer_cache_key!(u32, u64, i32, i64, usize);

// == Segment Validation ==
/// Rejects segments that would not address a direct child of the root.
pub fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(CacheError::InvalidKey("key segment is empty".to_string()));
    }
    if segment == "." || segment == ".." {
        return Err(CacheError::InvalidKey(format!(
            "'{}' is a reserved path segment",
            segment
        )));
    }
    if segment.contains(PATH_SEPARATOR) {
        return Err(CacheError::InvalidKey(format!(
            "'{}' contains the path separator",
            segment
        )));
    }
    if segment.contains('\0') {
        return Err(CacheError::InvalidKey(format!(
            "'{}' contains a NUL character",
            segment.escape_debug()
        )));
    }
    Ok(())
}

/// Joins the namespace root and a validated segment.
pub fn child_path(root: &str, segment: &str) -> Result<String> {
    validate_segment(segment)?;
    Ok(format!(
        "{}{}{}",
        root.trim_end_matches(PATH_SEPARATOR),
        PATH_SEPARATOR,
        segment
    ))
}
