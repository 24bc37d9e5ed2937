//! definition of the general error type of this crate

use std::sync::Arc;
use core::fmt;
use crate::{
    data::PackingError,
    translate::TranslationError,
    };

/**
    general object reporting an unexpected result regarding process data mapping, translation or bus exchanges

    Its variant are meant to help finding the cause responsible for the problem and how to deal with it.
*/
#[derive(Clone, Debug)]
pub enum EthercatError {
    /// error caused by communication support
    ///
    /// these errors are exterior to this library
    Io(Arc<std::io::Error>),

    /// error raised by the hardware backend during bus exchanges or SDO transfers, it is propagated as is
    Backend(Arc<dyn std::error::Error + Send + Sync>),

    /// the bus description is inconsistent (mismatching types or sizes, duplicated slaves, unsupported alignment)
    ///
    /// these errors are reported once at construction and cannot be fixed without changing the description
    Configuration(String),

    /// a value could not be translated from or to its binary form, with the translation context
    Translation(TranslationError),

    /// a value could not be packed or unpacked, reported directly by the codec when errors are not wrapped
    Packing(PackingError),

    /// the requested item does not exist, or a value exceeds its type's range
    Range {
        item: &'static str,
        name: String,
    },

    /// error reported by the master
    ///
    /// these errors can generally be handled and fixed by using the master differently when the issue is in the user code
    Master(&'static str),

    /// error is due to too much time elapsed, but does not compromise the communication
    ///
    /// these errors are generally contextual and the operation can be retried.
    Timeout(&'static str),
}

/// convenient alias to simplify return annotations
pub type EthercatResult<T=()> = core::result::Result<T, EthercatError>;

impl EthercatError {
    /// shorthand for a [Self::Range] error
    pub fn range(item: &'static str, name: impl fmt::Display) -> Self {
        Self::Range {item, name: name.to_string()}
    }
    /// shorthand for a [Self::Configuration] error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
    /// wrap any error coming from a hardware backend
    pub fn backend<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Backend(Arc::new(error))
    }
}

impl fmt::Display for EthercatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(error) => write!(f, "io: {}", error),
            Self::Backend(error) => write!(f, "backend: {}", error),
            Self::Configuration(message) => write!(f, "configuration: {}", message),
            Self::Translation(error) => write!(f, "translation: {}", error),
            Self::Packing(error) => write!(f, "packing: {}", error),
            Self::Range {item, name} => write!(f, "range: no {} named {:?}", item, name),
            Self::Master(message) => write!(f, "master: {}", message),
            Self::Timeout(message) => write!(f, "timeout: {}", message),
        }
    }
}

impl std::error::Error for EthercatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(error) => Some(error.as_ref()),
            Self::Backend(error) => Some(error.as_ref()),
            Self::Translation(error) => Some(error),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EthercatError {
    fn from(src: std::io::Error) -> Self {
        EthercatError::Io(Arc::new(src))
    }
}

impl From<PackingError> for EthercatError {
    fn from(src: PackingError) -> Self {
        EthercatError::Packing(src)
    }
}

impl From<TranslationError> for EthercatError {
    fn from(src: TranslationError) -> Self {
        EthercatError::Translation(src)
    }
}
