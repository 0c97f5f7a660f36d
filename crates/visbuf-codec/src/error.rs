//! Codec error types.

/// Which lane of a visibility record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Instance,
    Triangle,
}

impl std::fmt::Display for IdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdKind::Instance => f.write_str("instance"),
            IdKind::Triangle => f.write_str("triangle"),
        }
    }
}

/// Errors raised by the checked (producer-side) encoding API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// An id would collide with the sentinel once biased.
    #[error("{kind} id {value} exceeds the maximum encodable id {max}")]
    IdOverflow { kind: IdKind, value: u64, max: u32 },
}
