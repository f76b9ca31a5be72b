// Utility functions for discovery-service

use crate::error::Rejection;

/// Count non-overlapping, case-insensitive occurrences of `needle` in
/// `haystack`, scanning left to right.
///
/// `"111"` contains `"11"` once: the first match consumes two characters and
/// the scan resumes after it.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() || haystack.is_empty() {
        return 0;
    }
    let needle = needle.to_lowercase();
    haystack.to_lowercase().matches(needle.as_str()).count()
}

/// Validated 1-based page parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub size: usize,
    pub num: usize,
}

impl PageRequest {
    pub fn new(page_size: i32, page_num: i32) -> Result<Self, Rejection> {
        if page_size <= 0 || page_num <= 0 {
            return Err(Rejection::InvalidArgument(format!(
                "page_size and page_num must be positive (got {page_size}, {page_num})"
            )));
        }
        Ok(Self {
            size: page_size as usize,
            num: page_num as usize,
        })
    }

    pub fn offset(&self) -> usize {
        (self.num - 1).saturating_mul(self.size)
    }

    /// `[(num-1)*size, num*size)` of a fully sorted list; empty past the end.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items.into_iter().skip(self.offset()).take(self.size).collect()
    }
}
