use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn bad_value(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::BadValue {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn no_memory(context: impl Into<String>) -> Error {
        Error(
            ErrorKind::NoMemory {
                context: context.into(),
            }
            .into(),
        )
    }

    pub fn no_permission(context: impl Into<String>) -> Error {
        Error(
            ErrorKind::NoPermission {
                context: context.into(),
            }
            .into(),
        )
    }

    pub fn duplicate(what: impl Into<String>) -> Error {
        Error(ErrorKind::Duplicate { what: what.into() }.into())
    }

    pub fn not_found(what: impl Into<String>) -> Error {
        Error(ErrorKind::NotFound { what: what.into() }.into())
    }

    pub fn refused(context: impl Into<String>) -> Error {
        Error(
            ErrorKind::Refused {
                context: context.into(),
            }
            .into(),
        )
    }

    pub fn blocking(context: impl Into<String>) -> Error {
        Error(
            ErrorKind::Blocking {
                context: context.into(),
            }
            .into(),
        )
    }

    pub fn timed_out(context: impl Into<String>) -> Error {
        Error(
            ErrorKind::TimedOut {
                context: context.into(),
            }
            .into(),
        )
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("bad value for {name}: {message}")]
    BadValue { name: String, message: String },

    #[error("out of memory: {context}")]
    NoMemory { context: String },

    #[error("usage not permitted: {context}")]
    NoPermission { context: String },

    #[error("duplicate registration of {what}")]
    Duplicate { what: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("refused by provider: {context}")]
    Refused { context: String },

    #[error("would block: {context}")]
    Blocking { context: String },

    #[error("timed out: {context}")]
    TimedOut { context: String },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::OutOfMemory {
            Error::no_memory(e.to_string())
        } else {
            Error::io("", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_one_word() {
        assert_eq!(
            std::mem::size_of::<Error>(),
            std::mem::size_of::<*const ()>()
        );
        assert_eq!(
            std::mem::size_of::<crate::Result<()>>(),
            std::mem::size_of::<*const ()>()
        );
    }

    #[test]
    fn test_error_kind_roundtrip() {
        let err = Error::bad_value("offset", "exceeds capacity");
        assert!(matches!(err.kind(), ErrorKind::BadValue { name, .. } if name == "offset"));
        assert!(matches!(
            err.into_kind(),
            ErrorKind::BadValue { message, .. } if message == "exceeds capacity"
        ));
    }

    #[test]
    fn test_io_out_of_memory_maps_to_no_memory() {
        let io = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "mmap failed");
        let err: Error = io.into();
        assert!(matches!(err.kind(), ErrorKind::NoMemory { .. }));
    }
}
