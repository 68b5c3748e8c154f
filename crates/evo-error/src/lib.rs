//! Error types shared across the `evolve-server` workspace.
//!
//! The workspace distinguishes four error kinds, matching the run's failure
//! modes: a bad parameter or CLI flag (`Config`, fatal at startup and carries
//! the source line of the failing check so the process can exit with that
//! line number), a failed read/write of a parameter, population, log or
//! snapshot file (`Io`), a malformed or stale wire frame (`Protocol`, always
//! recoverable — log and keep serving), and an internal population/running-list
//! inconsistency (`Logic`, which callers attempt to self-repair).

use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

#[cfg(feature = "backtrace")]
use std::backtrace::Backtrace;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    Config,
    Io,
    Protocol,
    Logic,
    Multiple,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrString(Cow<'static, str>);

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<Cow<'static, str>>> From<T> for ErrString {
    fn from(v: T) -> Self {
        Self(v.into())
    }
}

#[derive(Debug)]
pub enum Error {
    /// A missing or invalid parameter, an inconsistent genome length, or any
    /// other startup check. `line` is the source line of the failing check,
    /// which `main` uses verbatim as the process exit code.
    Config { message: ErrString, line: u32 },
    /// A failed open/read/write of a parameter, population, log, or snapshot
    /// file.
    Io { message: ErrString },
    /// A short frame, an unknown command, a stale `evolveIdentifier`, or an
    /// unknown runID on the wire.
    Protocol { message: ErrString },
    /// A population index/age-list inconsistency detected by an invariant
    /// check.
    Logic { message: ErrString },

    Multiple(MultiDisplay),

    Context {
        context: ErrorContext,
        source: Box<Error>,
        #[cfg(feature = "backtrace")]
        backtrace: Backtrace,
    },
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Config { .. } => ErrorCode::Config,
            Self::Io { .. } => ErrorCode::Io,
            Self::Protocol { .. } => ErrorCode::Protocol,
            Self::Logic { .. } => ErrorCode::Logic,
            Self::Multiple(_) => ErrorCode::Multiple,
            Self::Context { .. } => ErrorCode::Context,
        }
    }

    /// The process exit code this error implies, per the CLI contract: 0 on
    /// success, otherwise the source line of the failing startup check.
    /// Non-`Config` errors that reach `main` exit with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { line, .. } => *line as i32,
            Self::Context { source, .. } => source.exit_code(),
            _ => 1,
        }
    }

    pub fn with_context(self, msg: impl Into<String>) -> Self {
        Error::Context {
            context: ErrorContext::new(msg),
            source: Box::new(self),
            #[cfg(feature = "backtrace")]
            backtrace: Backtrace::capture(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message, line } => {
                write!(f, "configuration error at line {}: {}", line, message)
            }
            Self::Io { message } => write!(f, "I/O error: {}", message),
            Self::Protocol { message } => write!(f, "protocol error: {}", message),
            Self::Logic { message } => write!(f, "logic error: {}", message),
            Self::Multiple(m) => write!(f, "multiple errors:\n{}", m),
            Self::Context {
                context, source, ..
            } => write!(f, "{}\nCaused by: {}", context, source),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Context { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io {
            message: source.to_string().into(),
        }
    }
}

#[derive(Debug)]
pub struct ErrorContext {
    message: String,
}

impl ErrorContext {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl Display for ErrorContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorContext {}

#[derive(Debug)]
pub struct MultiDisplay(Vec<Error>);

impl Display for MultiDisplay {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "[{}] {} (code: {:?})", i, e, e.code())?;
        }
        Ok(())
    }
}

impl From<Vec<Error>> for MultiDisplay {
    fn from(v: Vec<Error>) -> Self {
        Self(v)
    }
}

pub trait ResultExt<T> {
    fn context(self, msg: impl Into<String>) -> Result<T>;
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[doc(hidden)]
pub mod __private {
    #[inline]
    #[cold]
    #[must_use]
    pub fn must_use<E>(e: E) -> E {
        e
    }
}

#[macro_export]
macro_rules! config_err {
    ($line:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::Error::Config {
            message: format!($fmt, $($arg),*).into(),
            line: $line,
        })
    };
}

#[macro_export]
macro_rules! err {
    (Io: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::Error::Io { message: format!($fmt, $($arg),*).into() })
    };
    (Protocol: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::Error::Protocol { message: format!($fmt, $($arg),*).into() })
    };
    (Logic: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::Error::Logic { message: format!($fmt, $($arg),*).into() })
    };
}

#[macro_export]
macro_rules! bail {
    ($($tt:tt)+) => { return Err($crate::err!($($tt)+)) };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($tt:tt)+) => {
        if !$cond { $crate::bail!($($tt)+); }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_is_the_failing_line() {
        let e = config_err!(142, "populationSize missing");
        assert_eq!(e.exit_code(), 142);
    }

    #[test]
    fn non_config_errors_exit_with_one() {
        let e = err!(Protocol: "short frame");
        assert_eq!(e.exit_code(), 1);
    }

    #[test]
    fn context_preserves_inner_exit_code() {
        let e = config_err!(7, "bad gamma").with_context("loading preferences");
        assert_eq!(e.exit_code(), 7);
    }
}
