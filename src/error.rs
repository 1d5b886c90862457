use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use reqwest::{Method, StatusCode};

/// Coarse classification of an [`Error`].
///
/// Every distinguishable failure of a session operation maps to exactly one
/// kind, so a front end can match on it without inspecting messages.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    /// Timeout or connection failure before a response arrived.
    Transport,
    /// The server answered with something other than `200 OK`.
    Status,
    /// `200 OK`, but the body did not have the expected JSON shape.
    MalformedResponse,
    /// The operation needs a session token and none is held.
    NotAuthenticated,
    /// The caller omitted a required identifying argument.
    MissingParameter,
    /// Bad configuration or request input, detected locally.
    Validation,
    /// Local encoding or URL construction failure.
    Internal,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[must_use]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    #[must_use]
    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    /// Whether this is a transport failure caused by the call timing out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == Kind::Transport
            && self
                .downcast_ref::<reqwest::Error>()
                .is_some_and(reqwest::Error::is_timeout)
    }

    /// The HTTP status for [`Kind::Status`] errors.
    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        self.downcast_ref::<Status>().map(|s| s.status_code)
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Validation {
            reason: message.into(),
        }
        .into()
    }

    pub fn status<S: Into<String>>(
        status_code: StatusCode,
        method: Method,
        path: String,
        message: S,
    ) -> Self {
        Status {
            status_code,
            method,
            path,
            message: message.into(),
        }
        .into()
    }

    pub fn malformed<S: Into<String>>(endpoint: &'static str, reason: S) -> Self {
        Malformed {
            endpoint,
            reason: reason.into(),
        }
        .into()
    }

    #[must_use]
    pub fn not_authenticated(endpoint: &'static str) -> Self {
        NotAuthenticated { endpoint }.into()
    }

    #[must_use]
    pub fn missing_parameter(endpoint: &'static str, parameter: &'static str) -> Self {
        MissingParameter {
            endpoint,
            parameter,
        }
        .into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {}", self.kind, src),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// Non-200 response. `message` is the raw body text, which has no guaranteed shape.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub status_code: StatusCode,
    pub method: Method,
    pub path: String,
    pub message: String,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error({}) making {} call to {} with {}",
            self.status_code, self.method, self.path, self.message
        )
    }
}

impl StdError for Status {}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Malformed {
    pub endpoint: &'static str,
    pub reason: String,
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed {} response: {}", self.endpoint, self.reason)
    }
}

impl StdError for Malformed {}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotAuthenticated {
    pub endpoint: &'static str,
}

impl fmt::Display for NotAuthenticated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} requires a session token; authenticate first", self.endpoint)
    }
}

impl StdError for NotAuthenticated {}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingParameter {
    pub endpoint: &'static str,
    pub parameter: &'static str,
}

impl fmt::Display for MissingParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} requires {}", self.endpoint, self.parameter)
    }
}

impl StdError for MissingParameter {}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}

impl From<Status> for Error {
    fn from(err: Status) -> Self {
        Error::with_source(Kind::Status, err)
    }
}

impl From<Malformed> for Error {
    fn from(err: Malformed) -> Self {
        Error::with_source(Kind::MalformedResponse, err)
    }
}

impl From<NotAuthenticated> for Error {
    fn from(err: NotAuthenticated) -> Self {
        Error::with_source(Kind::NotAuthenticated, err)
    }
}

impl From<MissingParameter> for Error {
    fn from(err: MissingParameter) -> Self {
        Error::with_source(Kind::MissingParameter, err)
    }
}

impl From<Validation> for Error {
    fn from(err: Validation) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::with_source(Kind::Transport, e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<reqwest::header::InvalidHeaderValue> for Error {
    fn from(e: reqwest::header::InvalidHeaderValue) -> Self {
        Error::with_source(Kind::Validation, e)
    }
}
