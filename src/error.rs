pub type UnreplResult<T> = std::result::Result<T, UnreplError>;

/// A failure reported by an external reader when turning wire text into an
/// AST.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[error("Read error at line {line}, column {column}: {message}")]
pub struct ReadError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ReadError {
    pub fn new<M: Into<String>>(line: usize, column: usize, message: M) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum UnreplError {
    #[error("No reader registered for tag #{tag}")]
    UnknownTag { tag: String },

    #[error("Missing template parameter {name} (supplied: {})", .supplied.join(", "))]
    MissingParameter { name: String, supplied: Vec<String> },

    #[error("Elision payload must be nil or a map with :get, found {found}")]
    MalformedElisionPayload { found: String },

    #[error("Cannot decode attachment as {media_type}: {reason}")]
    AttachmentDecode { media_type: String, reason: String },

    #[error("Malformed template: {reason}")]
    MalformedTemplate { reason: String },

    #[error("Malformed #{tag} payload: {reason}")]
    MalformedTag { tag: String, reason: String },

    #[error("Output marker no longer exists")]
    UnknownMarker,

    #[error(transparent)]
    Read(#[from] ReadError),
}

impl UnreplError {
    /// Whether the failure is confined to the subtree that produced it.
    ///
    /// Contained failures are recorded on the [`crate::Rendering`] and the
    /// offending subtree is dropped; the rest of the render carries on.
    pub const fn is_contained(&self) -> bool {
        match self {
            Self::AttachmentDecode { .. } | Self::MalformedElisionPayload { .. } => true,
            Self::UnknownTag { .. }
            | Self::MissingParameter { .. }
            | Self::MalformedTemplate { .. }
            | Self::MalformedTag { .. }
            | Self::UnknownMarker
            | Self::Read(_) => false,
        }
    }

    pub(crate) fn malformed_tag<T: Into<String>, R: Into<String>>(tag: T, reason: R) -> Self {
        Self::MalformedTag {
            tag: tag.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ntest::timeout(100)]
    fn missing_parameter_lists_supplied_keywords() {
        let err = UnreplError::MissingParameter {
            name: ":x".to_string(),
            supplied: vec![":a".to_string(), ":b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Missing template parameter :x (supplied: :a, :b)"
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn read_errors_convert_and_stay_fatal() {
        let err: UnreplError = ReadError::new(2, 7, "unbalanced ]").into();
        assert!(!err.is_contained());
        assert_eq!(
            err.to_string(),
            "Read error at line 2, column 7: unbalanced ]"
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn attachment_failures_are_contained() {
        let err = UnreplError::AttachmentDecode {
            media_type: "image/png".to_string(),
            reason: "missing :content".to_string(),
        };
        assert!(err.is_contained());
    }
}
