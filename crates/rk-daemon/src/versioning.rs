// SPDX-License-Identifier: MIT OR Apache-2.0
//! API versioning: parsing, negotiation, and the resolving middleware.

use crate::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rk_config::VersioningConfig;
use rk_error::Failure;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// ApiVersion
// ---------------------------------------------------------------------------

/// An API version consisting of a major and minor component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
}

impl ApiVersion {
    /// Parse a version string such as `"v1"`, `"v1.0"`, or `"1.2"`.
    pub fn parse(s: &str) -> Result<Self, ApiVersionError> {
        let s = s.trim();
        let s = s
            .strip_prefix('v')
            .or_else(|| s.strip_prefix('V'))
            .unwrap_or(s);
        if s.is_empty() {
            return Err(ApiVersionError::InvalidFormat(
                "empty version string".to_string(),
            ));
        }

        let (major, minor) = match s.split_once('.') {
            Some((major, minor)) => (major, Some(minor)),
            None => (s, None),
        };
        let major = major.parse::<u32>().map_err(|_| {
            ApiVersionError::InvalidFormat(format!("invalid major version: {major}"))
        })?;
        let minor = match minor {
            Some(m) => m.parse::<u32>().map_err(|_| {
                ApiVersionError::InvalidFormat(format!("invalid minor version: {m}"))
            })?,
            None => 0,
        };

        Ok(Self { major, minor })
    }

    /// Two versions are compatible if they share the same major version.
    pub fn is_compatible(&self, other: &ApiVersion) -> bool {
        self.major == other.major
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

impl Ord for ApiVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
    }
}

impl PartialOrd for ApiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// ApiVersionError
// ---------------------------------------------------------------------------

/// Errors that can occur during version parsing or negotiation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiVersionError {
    /// The version string could not be parsed.
    #[error("invalid version format: {0}")]
    InvalidFormat(String),
    /// The parsed version is not supported by this server.
    #[error("unsupported API version: {0}")]
    UnsupportedVersion(ApiVersion),
    /// The configured version header is not a valid header name.
    #[error("invalid version header name: {0}")]
    InvalidHeader(String),
}

// ---------------------------------------------------------------------------
// VersionNegotiator
// ---------------------------------------------------------------------------

/// Picks the best supported version given a client request.
pub struct VersionNegotiator;

impl VersionNegotiator {
    /// Given the `requested` version and a list of `supported` versions,
    /// return the highest compatible version (same major) that does not
    /// exceed the requested version. Returns `None` if no compatible version
    /// exists.
    pub fn negotiate(requested: &ApiVersion, supported: &[ApiVersion]) -> Option<ApiVersion> {
        supported
            .iter()
            .filter(|v| v.is_compatible(requested) && **v <= *requested)
            .max()
            .copied()
    }
}

// ---------------------------------------------------------------------------
// ApiVersioning
// ---------------------------------------------------------------------------

/// Per-request version resolution settings.
#[derive(Debug, Clone)]
pub struct ApiVersioning {
    enabled: bool,
    header: HeaderName,
    default: ApiVersion,
    supported: Vec<ApiVersion>,
}

impl ApiVersioning {
    /// Build from configuration. The default version is always supported,
    /// alongside any listed under `supported`.
    pub fn from_config(config: &VersioningConfig) -> Result<Self, ApiVersionError> {
        let header = HeaderName::try_from(config.header())
            .map_err(|_| ApiVersionError::InvalidHeader(config.header().to_string()))?;
        let default = ApiVersion::parse(config.default_version())?;
        let extra = config
            .supported()
            .iter()
            .map(|v| ApiVersion::parse(v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            enabled: config.enabled(),
            header,
            default,
            supported: vec![default],
        }
        .with_supported(extra))
    }

    /// Add supported versions.
    pub fn with_supported(mut self, versions: impl IntoIterator<Item = ApiVersion>) -> Self {
        for v in versions {
            if !self.supported.contains(&v) {
                self.supported.push(v);
            }
        }
        self.supported.sort();
        self
    }

    /// Whether resolution runs at all.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Header carrying the version.
    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Version used when the request names none.
    pub fn default_version(&self) -> ApiVersion {
        self.default
    }

    /// Resolve the version for a request: the header first, then a `/vN/`
    /// path segment, then the default. The result is negotiated down to the
    /// best supported version.
    pub fn resolve(&self, headers: &HeaderMap, path: &str) -> Result<ApiVersion, ApiVersionError> {
        let requested = match headers.get(&self.header) {
            Some(raw) => {
                let raw = raw.to_str().map_err(|_| {
                    ApiVersionError::InvalidFormat("non-ASCII version header".to_string())
                })?;
                ApiVersion::parse(raw)?
            }
            None => path_version(path).unwrap_or(self.default),
        };
        VersionNegotiator::negotiate(&requested, &self.supported)
            .ok_or(ApiVersionError::UnsupportedVersion(requested))
    }
}

/// The first `vN` / `vN.M` path segment.
pub fn path_version(path: &str) -> Option<ApiVersion> {
    path.split('/')
        .filter(|seg| {
            seg.strip_prefix('v')
                .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        })
        .find_map(|seg| ApiVersion::parse(seg).ok())
}

/// Resolve the API version, store it as an [`ApiVersion`] request extension
/// and echo it in the version header.
pub async fn version_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let versioning = &state.versioning;
    if !versioning.enabled() {
        return next.run(req).await;
    }

    let path = crate::dispatch::original_path(&req);
    let version = match versioning.resolve(req.headers(), &path) {
        Ok(v) => v,
        Err(e) => {
            return ApiError::from(Failure::http(400, e.to_string())).into_response();
        }
    };
    req.extensions_mut().insert(version);

    let mut resp = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&version.to_string()) {
        resp.headers_mut().insert(versioning.header().clone(), value);
    }
    resp
}
