//! Bid platforms and the per-row verdict model.
//!
//! Every landing page belongs to exactly one [`Platform`]. Labels coming from
//! the input sheet are matched case- and whitespace-insensitively; anything
//! unrecognised is treated as [`Platform::Generic`].

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    DemandStar,
    Bonfire,
    IonWave,
    BidNetDirect,
    Generic,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::DemandStar,
        Platform::Bonfire,
        Platform::IonWave,
        Platform::BidNetDirect,
        Platform::Generic,
    ];

    /// Resolve a sheet label to a platform. Never fails: unknown labels map to `Generic`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "demandstar" => Platform::DemandStar,
            "bonfire" | "bonfirehub" => Platform::Bonfire,
            "ionwave" => Platform::IonWave,
            "bidnetdirect" => Platform::BidNetDirect,
            _ => Platform::Generic,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::DemandStar => "DemandStar",
            Platform::Bonfire => "Bonfire",
            Platform::IonWave => "IonWave",
            Platform::BidNetDirect => "BidNetDirect",
            Platform::Generic => "Generic",
        }
    }

    /// Whether validation goes through the page renderer rather than a plain HTTP fetch.
    pub fn needs_browser(&self) -> bool {
        match self {
            Platform::DemandStar | Platform::Bonfire | Platform::IonWave => true,
            Platform::BidNetDirect | Platform::Generic => false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UrlRewriteError {
    #[error("Cannot parse URL '{url}': {reason}")]
    Unparseable { url: String, reason: String },

    #[error("URL '{0}' has no host")]
    NoHost(String),
}

/// Replace everything after the origin of `url` with `suffix`.
///
/// Only scheme, host and an explicit port survive, so rewriting an already
/// rewritten URL returns it unchanged.
pub fn rewrite_to_origin(url: &str, suffix: &str) -> Result<String, UrlRewriteError> {
    let parsed = Url::parse(url.trim()).map_err(|e| UrlRewriteError::Unparseable {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| UrlRewriteError::NoHost(url.to_string()))?;

    let origin = match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    };

    Ok(format!("{}{}", origin, suffix))
}

/// Why a row failed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    /// HTTP fetch failed: network error, timeout, or non-success status.
    Fetch(String),
    /// Browser could not launch, navigate, or hand back the page.
    Render(String),
    /// The landing URL could not be turned into the platform's canonical URL.
    Rewrite(String),
    /// No heading element after rendering.
    MissingHeading,
    /// A heading exists but does not carry the expected text.
    WrongHeading { found: String },
    /// No element with the expected `title` attribute.
    MissingTitleMarker { title: String },
    /// Rendered URL does not end up on the expected platform path.
    UnexpectedLocation { expected_suffix: String, found: String },
    /// Optional content check found none of the platform's markers.
    MissingContent(String),
    /// The row's validation panicked; the batch carries on.
    Panicked(String),
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationFailure::Fetch(e) => write!(f, "failed to fetch URL: {}", e),
            ValidationFailure::Render(e) => write!(f, "failed to render page: {}", e),
            ValidationFailure::Rewrite(e) => write!(f, "failed to rewrite URL: {}", e),
            ValidationFailure::MissingHeading => write!(f, "no heading found"),
            ValidationFailure::WrongHeading { found } => write!(f, "wrong heading: '{}'", found),
            ValidationFailure::MissingTitleMarker { title } => {
                write!(f, "no element with title='{}' found", title)
            }
            ValidationFailure::UnexpectedLocation { expected_suffix, found } => {
                write!(f, "expected '{}' in resolved URL: {}", expected_suffix, found)
            }
            ValidationFailure::MissingContent(what) => write!(f, "page content check failed: {}", what),
            ValidationFailure::Panicked(e) => write!(f, "validation aborted unexpectedly: {}", e),
        }
    }
}

/// Outcome of validating one row, paired with the URL to persist if it passed.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub platform: Platform,
    pub passed: bool,
    pub resolved_url: String,
    pub failure: Option<ValidationFailure>,
    /// The renderer gave up waiting for content and the check ran on a partial page.
    pub render_timed_out: bool,
}

impl Verdict {
    pub fn pass(platform: Platform, resolved_url: impl Into<String>) -> Self {
        Self {
            platform,
            passed: true,
            resolved_url: resolved_url.into(),
            failure: None,
            render_timed_out: false,
        }
    }

    pub fn fail(platform: Platform, resolved_url: impl Into<String>, failure: ValidationFailure) -> Self {
        Self {
            platform,
            passed: false,
            resolved_url: resolved_url.into(),
            failure: Some(failure),
            render_timed_out: false,
        }
    }

    pub fn with_render_timeout(mut self, timed_out: bool) -> Self {
        self.render_timed_out = timed_out;
        self
    }
}
