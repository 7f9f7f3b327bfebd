// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Error types returned by this crate.

use std::fmt;

/// All the kinds of [`Error`] this crate can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A construction argument is out of range.
    InvalidArgument,
    /// The domain has fewer than two distinct items.
    InvalidDomain,
    /// The privacy parameter is not positive or is NaN.
    InvalidPrivacyBudget,
    /// The operation is not allowed in the current phase.
    InvalidState,
    /// The item is not a member of the domain.
    ItemNotInDomain,
    /// The domain was released by `cleanup`.
    DomainUnavailable,
    /// The operation is not supported by this implementation.
    UnsupportedOperation,
}

impl ErrorKind {
    /// Converts this kind into a static string.
    pub const fn into_static(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::InvalidDomain => "InvalidDomain",
            ErrorKind::InvalidPrivacyBudget => "InvalidPrivacyBudget",
            ErrorKind::InvalidState => "InvalidState",
            ErrorKind::ItemNotInDomain => "ItemNotInDomain",
            ErrorKind::DomainUnavailable => "DomainUnavailable",
            ErrorKind::UnsupportedOperation => "UnsupportedOperation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.into_static())
    }
}

/// The error struct returned by all fallible functions of this crate.
///
/// An error carries its [`ErrorKind`], a human-readable message, and an optional list of
/// `(key, value)` context pairs describing the state in which it occurred.
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<(&'static str, String)>,
}

impl Error {
    /// Creates a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: vec![],
        }
    }

    /// Adds a `(key, value)` context pair to this error.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message of this error.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the context pairs attached to this error.
    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }
}

// Convenience constructors, one per kind.
impl Error {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub(crate) fn invalid_domain(domain_size: usize) -> Self {
        Self::new(
            ErrorKind::InvalidDomain,
            format!("domain size must be greater than 1; got {domain_size}"),
        )
    }

    pub(crate) fn invalid_privacy_budget(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPrivacyBudget, message)
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, message)
    }

    pub(crate) fn item_not_in_domain() -> Self {
        Self::new(ErrorKind::ItemNotInDomain, "item is not in the domain")
    }

    pub(crate) fn domain_unavailable() -> Self {
        Self::new(
            ErrorKind::DomainUnavailable,
            "domain was released by cleanup",
        )
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedOperation, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if !self.context.is_empty() {
            write!(f, ", context: {{ ")?;
            for (i, (key, value)) in self.context.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}: {value}")?;
            }
            write!(f, " }}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Plain `{:?}` prints the Display form.
        if f.alternate() {
            let mut de = f.debug_struct("Error");
            de.field("kind", &self.kind);
            de.field("message", &self.message);
            de.field("context", &self.context);
            return de.finish();
        }
        fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_context() {
        let err = Error::invalid_domain(1);
        insta::assert_snapshot!(err, @"InvalidDomain: domain size must be greater than 1; got 1");
    }

    #[test]
    fn test_display_with_context() {
        let err = Error::invalid_state("stop_warmup requires the WarmUp phase")
            .with_context("phase", "Statistics");
        insta::assert_snapshot!(
            err,
            @"InvalidState: stop_warmup requires the WarmUp phase, context: { phase: Statistics }"
        );
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(err.context().len(), 1);
    }
}
