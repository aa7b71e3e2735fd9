//! Validator configuration.

use crate::schema::MergePolicy;

/// Policy for parts whose name matches no schema property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownParts {
    /// Defer to the schema's `additionalProperties`; unspecified means allowed.
    #[default]
    FollowSchema,
    /// Report every unknown part as an unexpected property.
    Reject,
}

/// Tunables for a validation pass.
///
/// # Example
///
/// ```rust
/// use formcheck::{MergePolicy, UnknownParts, ValidatorOptions};
///
/// let options = ValidatorOptions::new()
///     .with_merge_policy(MergePolicy::Strict)
///     .with_unknown_parts(UnknownParts::Reject)
///     .with_max_buffered_part_bytes(64 * 1024);
///
/// assert_eq!(options.merge_policy(), MergePolicy::Strict);
/// ```
#[derive(Debug, Clone)]
pub struct ValidatorOptions {
    merge_policy: MergePolicy,
    unknown_parts: UnknownParts,
    max_header_bytes: usize,
    max_buffered_part_bytes: usize,
    max_buffered_form_bytes: usize,
}

impl ValidatorOptions {
    pub const DEFAULT_MAX_HEADER_BYTES: usize = 16 * 1024;
    pub const DEFAULT_MAX_BUFFERED_PART_BYTES: usize = 10 * 1024 * 1024;
    pub const DEFAULT_MAX_BUFFERED_FORM_BYTES: usize = 32 * 1024 * 1024;

    pub fn new() -> Self {
        Self {
            merge_policy: MergePolicy::default(),
            unknown_parts: UnknownParts::default(),
            max_header_bytes: Self::DEFAULT_MAX_HEADER_BYTES,
            max_buffered_part_bytes: Self::DEFAULT_MAX_BUFFERED_PART_BYTES,
            max_buffered_form_bytes: Self::DEFAULT_MAX_BUFFERED_FORM_BYTES,
        }
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    pub fn with_unknown_parts(mut self, policy: UnknownParts) -> Self {
        self.unknown_parts = policy;
        self
    }

    /// Upper bound on the header block of a single part.
    pub fn with_max_header_bytes(mut self, limit: usize) -> Self {
        self.max_header_bytes = limit;
        self
    }

    /// Upper bound on a text or JSON part that has to be held in memory.
    ///
    /// Binary parts are streamed and never count against this limit.
    pub fn with_max_buffered_part_bytes(mut self, limit: usize) -> Self {
        self.max_buffered_part_bytes = limit;
        self
    }

    /// Upper bound on the text and JSON payloads of one request, summed.
    ///
    /// Decoded values are kept in the resulting form, so this caps the memory
    /// a single request can hold. Parts past the budget are skipped and
    /// reported.
    pub fn with_max_buffered_form_bytes(mut self, limit: usize) -> Self {
        self.max_buffered_form_bytes = limit;
        self
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.merge_policy
    }

    pub fn unknown_parts(&self) -> UnknownParts {
        self.unknown_parts
    }

    pub fn max_header_bytes(&self) -> usize {
        self.max_header_bytes
    }

    pub fn max_buffered_part_bytes(&self) -> usize {
        self.max_buffered_part_bytes
    }

    pub fn max_buffered_form_bytes(&self) -> usize {
        self.max_buffered_form_bytes
    }
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self::new()
    }
}
