//! Error type and Return values used by the Serialization.

use alloc::string::{String, ToString};
use core::fmt::Display;

use serde::ser;

/// Represents all possible errors that can happen during Serialization.
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The value contains a type without a canonical word representation,
    /// for example floating point numbers, maps or data-carrying enum
    /// variants. Hashing such values would make the result depend on how the
    /// caller chose to represent them.
    TypeNotRepresentable(&'static str),
    /// Error raised by a `Serialize` implementation.
    Custom(String),
}

impl ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: Display,
    {
        Error::Custom(msg.to_string())
    }
}
#[cfg(feature = "std")]
impl ser::StdError for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::TypeNotRepresentable(type_name) => {
                f.write_str("type is not representable in the canonical encoding: ")?;
                f.write_str(type_name)
            }
            Error::Custom(msg) => f.write_str(msg),
        }
    }
}

/// Alias for `Result` using the [Error] returned by the Serializer.
pub type Result<T> = core::result::Result<T, Error>;
