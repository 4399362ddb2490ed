//! Scene graph errors.

use lattice_core::alloc::AllocError;
use lattice_render::BufferError;

/// Fatal scene graph error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The sprite allocator could not obtain storage.
    Allocation(AllocError),
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allocation(err) => write!(f, "Sprite allocation failed: {}", err),
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Allocation(err) => Some(err),
        }
    }
}

impl From<AllocError> for SceneError {
    fn from(err: AllocError) -> Self {
        Self::Allocation(err)
    }
}

/// Recoverable failure while preparing a frame.
///
/// Nothing that failed to upload is marked clean, so calling
/// `prepare_rendering` again next frame retries the work.
#[derive(Debug, Clone, PartialEq)]
pub enum PrepareError {
    /// An instance buffer upload failed.
    Upload {
        /// Where the failure happened, innermost first.
        context: Vec<String>,
        source: BufferError,
    },
    /// The camera's view transform has no inverse.
    SingularView,
}

impl PrepareError {
    /// Attach an outer context description to an upload failure.
    pub fn context(mut self, ctx: impl Into<String>) -> Self {
        if let Self::Upload { context, .. } = &mut self {
            context.push(ctx.into());
        }
        self
    }

    /// The buffer error behind an upload failure.
    pub fn buffer_error(&self) -> Option<&BufferError> {
        match self {
            Self::Upload { source, .. } => Some(source),
            Self::SingularView => None,
        }
    }
}

impl std::fmt::Display for PrepareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upload { context, source } => {
                for ctx in context.iter().rev() {
                    write!(f, "{}: ", ctx)?;
                }
                write!(f, "{}", source)
            }
            Self::SingularView => write!(f, "Camera view transform is not invertible"),
        }
    }
}

impl std::error::Error for PrepareError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Upload { source, .. } => Some(source),
            Self::SingularView => None,
        }
    }
}

impl From<BufferError> for PrepareError {
    fn from(source: BufferError) -> Self {
        Self::Upload {
            context: Vec::new(),
            source,
        }
    }
}

/// Adds context to upload results as they propagate outward.
pub trait UploadResultExt<T> {
    fn upload_context<S: Into<String>>(self, f: impl FnOnce() -> S) -> Result<T, PrepareError>;
}

impl<T, E: Into<PrepareError>> UploadResultExt<T> for Result<T, E> {
    fn upload_context<S: Into<String>>(self, f: impl FnOnce() -> S) -> Result<T, PrepareError> {
        self.map_err(|err| err.into().context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_reads_outermost_first() {
        let result: Result<(), BufferError> = Err(BufferError::ZeroSized);
        let err = result
            .upload_context(|| "texture array 3")
            .upload_context(|| "cell (1, -2)")
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "cell (1, -2): texture array 3: Cannot create an instance buffer of size 0"
        );
        assert_eq!(err.buffer_error(), Some(&BufferError::ZeroSized));
    }

    #[test]
    fn test_singular_view_ignores_context() {
        let err = PrepareError::SingularView.context("cell (0, 0)");
        assert_eq!(err, PrepareError::SingularView);
    }
}
