// Rust RTSP Playback
//
// Copyright (C) 2020-2021 Sebastian Dröge <sebastian@centricular.com>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

//! Host-facing error taxonomy and the pipeline-internal error domain it is translated from.

use std::convert::TryFrom;
use std::{error, fmt};

use crate::render::RenderTarget;

/// Error kinds reported to the host through [`crate::observer::Observer::on_error`].
///
/// The numeric values returned by [`ErrorKind::code`] are part of the external contract.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The stream does not exist or is unreachable.
    NotFound,
    /// Credentials or permissions were rejected.
    NotAuthorized,
    /// The source is reachable but asserts a different identity.
    WrongDomain,
    /// Any other failure.
    Other,
}

impl ErrorKind {
    pub const fn code(self) -> i32 {
        match self {
            ErrorKind::NotFound => 1,
            ErrorKind::NotAuthorized => 2,
            ErrorKind::WrongDomain => 3,
            ErrorKind::Other => 9999,
        }
    }
}

impl TryFrom<i32> for ErrorKind {
    type Error = UnknownErrorCode;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(ErrorKind::NotFound),
            2 => Ok(ErrorKind::NotAuthorized),
            3 => Ok(ErrorKind::WrongDomain),
            9999 => Ok(ErrorKind::Other),
            _ => Err(UnknownErrorCode(code)),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "Not found",
            ErrorKind::NotAuthorized => "Not authorized",
            ErrorKind::WrongDomain => "Wrong domain",
            ErrorKind::Other => "Other error",
        };
        fmt.write_str(s)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UnknownErrorCode(pub i32);

impl fmt::Display for UnknownErrorCode {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "Unknown error code {}", self.0)
    }
}

impl error::Error for UnknownErrorCode {}

/// Error domains of the pipeline engine.
///
/// Codes inside the `Core`, `Library`, `Resource` and `Stream` domains follow the GStreamer
/// error enums, `Tls` follows GIO's TLS error enum.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorDomain {
    Core,
    Library,
    Resource,
    Stream,
    Tls,
    Other,
}

pub mod core_error {
    pub const FAILED: i32 = 1;
    pub const STATE_CHANGE: i32 = 4;
    pub const SEEK: i32 = 9;
    pub const MISSING_PLUGIN: i32 = 12;
}

pub mod resource_error {
    pub const NOT_FOUND: i32 = 3;
    pub const OPEN_READ: i32 = 5;
    pub const OPEN_READ_WRITE: i32 = 7;
    pub const NOT_AUTHORIZED: i32 = 15;
}

pub mod tls_error {
    pub const UNAVAILABLE: i32 = 0;
    pub const BAD_CERTIFICATE: i32 = 2;
    pub const CERTIFICATE_REQUIRED: i32 = 5;
}

/// Translates a pipeline-internal error into the host taxonomy.
///
/// Total: every `(domain, code)` pair maps to exactly one kind, unknown pairs to
/// [`ErrorKind::Other`].
pub fn map_error_code(domain: ErrorDomain, code: i32) -> ErrorKind {
    match (domain, code) {
        (ErrorDomain::Resource, resource_error::NOT_FOUND)
        | (ErrorDomain::Resource, resource_error::OPEN_READ)
        | (ErrorDomain::Resource, resource_error::OPEN_READ_WRITE) => ErrorKind::NotFound,
        (ErrorDomain::Resource, resource_error::NOT_AUTHORIZED)
        | (ErrorDomain::Tls, tls_error::CERTIFICATE_REQUIRED) => ErrorKind::NotAuthorized,
        (ErrorDomain::Tls, tls_error::BAD_CERTIFICATE) => ErrorKind::WrongDomain,
        _ => ErrorKind::Other,
    }
}

/// A failure reported by the pipeline engine, before translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineError {
    pub domain: ErrorDomain,
    pub code: i32,
    pub message: String,
    pub debug: Option<String>,
}

impl PipelineError {
    pub fn new(domain: ErrorDomain, code: i32, message: impl Into<String>) -> Self {
        PipelineError {
            domain,
            code,
            message: message.into(),
            debug: None,
        }
    }

    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.debug = Some(debug.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        map_error_code(self.domain, self.code)
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{} ({:?} error {})", self.message, self.domain, self.code)?;
        if let Some(ref debug) = self.debug {
            write!(fmt, ": {}", debug)?;
        }
        Ok(())
    }
}

impl error::Error for PipelineError {}

/// Error reported to the host, passed by value to the observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    kind: ErrorKind,
    message: String,
    detail: Option<String>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ErrorRecord {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Engine diagnostic detail, if the engine provided any.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl From<PipelineError> for ErrorRecord {
    fn from(err: PipelineError) -> Self {
        ErrorRecord {
            kind: err.kind(),
            message: err.message,
            detail: err.debug,
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}: {}", self.kind, self.message)
    }
}

impl error::Error for ErrorRecord {}

/// Construction failure of a [`crate::controller::Controller`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// The render target handle is not usable.
    InvalidTarget,
    /// Another controller is bound to this render target.
    TargetInUse(RenderTarget),
    /// The transport mask permits no lower transport.
    NoTransports,
    /// The engine could not be initialized or could not create a pipeline.
    Engine(PipelineError),
}

impl fmt::Display for InitError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::InvalidTarget => write!(fmt, "Invalid render target"),
            InitError::TargetInUse(target) => {
                write!(fmt, "Render target {} is already bound", target)
            }
            InitError::NoTransports => write!(fmt, "No lower transport permitted"),
            InitError::Engine(err) => write!(fmt, "Engine failure: {}", err),
        }
    }
}

impl error::Error for InitError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            InitError::Engine(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PipelineError> for InitError {
    fn from(err: PipelineError) -> Self {
        InitError::Engine(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAINS: [ErrorDomain; 6] = [
        ErrorDomain::Core,
        ErrorDomain::Library,
        ErrorDomain::Resource,
        ErrorDomain::Stream,
        ErrorDomain::Tls,
        ErrorDomain::Other,
    ];

    #[test]
    fn wire_codes_are_stable() {
        assert_eq!(ErrorKind::NotFound.code(), 1);
        assert_eq!(ErrorKind::NotAuthorized.code(), 2);
        assert_eq!(ErrorKind::WrongDomain.code(), 3);
        assert_eq!(ErrorKind::Other.code(), 9999);

        for kind in &[
            ErrorKind::NotFound,
            ErrorKind::NotAuthorized,
            ErrorKind::WrongDomain,
            ErrorKind::Other,
        ] {
            assert_eq!(ErrorKind::try_from(kind.code()), Ok(*kind));
        }
        assert_eq!(ErrorKind::try_from(4), Err(UnknownErrorCode(4)));
        assert_eq!(ErrorKind::try_from(0), Err(UnknownErrorCode(0)));
    }

    #[test]
    fn known_codes() {
        assert_eq!(
            map_error_code(ErrorDomain::Resource, resource_error::NOT_FOUND),
            ErrorKind::NotFound
        );
        assert_eq!(
            map_error_code(ErrorDomain::Resource, resource_error::OPEN_READ),
            ErrorKind::NotFound
        );
        assert_eq!(
            map_error_code(ErrorDomain::Resource, resource_error::OPEN_READ_WRITE),
            ErrorKind::NotFound
        );
        assert_eq!(
            map_error_code(ErrorDomain::Resource, resource_error::NOT_AUTHORIZED),
            ErrorKind::NotAuthorized
        );
        assert_eq!(
            map_error_code(ErrorDomain::Tls, tls_error::CERTIFICATE_REQUIRED),
            ErrorKind::NotAuthorized
        );
        assert_eq!(
            map_error_code(ErrorDomain::Tls, tls_error::BAD_CERTIFICATE),
            ErrorKind::WrongDomain
        );
    }

    #[test]
    fn same_code_in_other_domain_is_other() {
        assert_eq!(
            map_error_code(ErrorDomain::Stream, resource_error::NOT_FOUND),
            ErrorKind::Other
        );
        assert_eq!(
            map_error_code(ErrorDomain::Core, resource_error::NOT_AUTHORIZED),
            ErrorKind::Other
        );
        assert_eq!(
            map_error_code(ErrorDomain::Resource, tls_error::BAD_CERTIFICATE),
            ErrorKind::Other
        );
    }

    #[test]
    fn boundary_and_out_of_range_codes_are_other() {
        for domain in &DOMAINS {
            for code in &[i32::MIN, -1, 16, 9999, i32::MAX] {
                assert_eq!(map_error_code(*domain, *code), ErrorKind::Other);
            }
        }
        assert_eq!(map_error_code(ErrorDomain::Resource, 0), ErrorKind::Other);
        assert_eq!(
            map_error_code(ErrorDomain::Tls, tls_error::UNAVAILABLE),
            ErrorKind::Other
        );
    }

    #[test]
    fn record_keeps_diagnostics() {
        let err = PipelineError::new(
            ErrorDomain::Resource,
            resource_error::NOT_AUTHORIZED,
            "Unauthorized",
        )
        .with_debug("rtspsrc: 401 Unauthorized");

        let record = ErrorRecord::from(err);
        assert_eq!(record.kind(), ErrorKind::NotAuthorized);
        assert_eq!(record.code(), 2);
        assert_eq!(record.message(), "Unauthorized");
        assert_eq!(record.detail(), Some("rtspsrc: 401 Unauthorized"));
    }
}
