//! Row validator dispatcher.
//!
//! Routes each landing page to the check for its platform and turns every
//! outcome, including panics, into a [`Verdict`]. Nothing a single row does
//! can stop the batch.
//!
//! | Platform | Check |
//! |---|---|
//! | DemandStar | render, wait for the listing or a heading, heading must contain the expected text |
//! | Bonfire | rewrite to the open-opportunities portal, render; loading is enough |
//! | IonWave | rewrite to the sourcing events page, render; loading is enough |
//! | BidNetDirect / Generic | HTTP GET with redirects, page must have an element with the expected `title` |

use futures::FutureExt;
use scraper::{Html, Selector};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::browser::{PageRenderer, RenderRequest, RenderedPage};
use crate::config::{AppConfig, BonfireRules, DemandStarRules, IonWaveRules, ListingRules};
use crate::fetch::{FetchError, PageFetcher};
use crate::platform::{rewrite_to_origin, Platform, ValidationFailure, Verdict};

/// Immutable per-platform expectations handed to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRules {
    pub demandstar: DemandStarRules,
    pub bonfire: BonfireRules,
    pub ionwave: IonWaveRules,
    pub listing: ListingRules,
    pub render_timeout: Duration,
    pub settle_delay: Duration,
}

impl ValidationRules {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            demandstar: config.platforms.demandstar.clone(),
            bonfire: config.platforms.bonfire.clone(),
            ionwave: config.platforms.ionwave.clone(),
            listing: config.platforms.listing.clone(),
            render_timeout: config.browser.render_timeout(),
            settle_delay: config.browser.settle_delay(),
        }
    }
}

pub struct LinkValidator {
    rules: ValidationRules,
    fetcher: PageFetcher,
    renderer: Arc<dyn PageRenderer>,
}

impl LinkValidator {
    pub fn new(rules: ValidationRules, fetcher: PageFetcher, renderer: Arc<dyn PageRenderer>) -> Self {
        Self {
            rules,
            fetcher,
            renderer,
        }
    }

    pub fn from_config(config: &AppConfig, renderer: Arc<dyn PageRenderer>) -> Result<Self, FetchError> {
        let fetcher = PageFetcher::new(&config.http)?;
        Ok(Self::new(ValidationRules::from_config(config), fetcher, renderer))
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Validate one landing page. Never fails and never panics.
    pub async fn validate(&self, url: &str, platform_label: &str) -> Verdict {
        let platform = Platform::from_label(platform_label);
        debug!("Validating ({}): {}", platform, url);

        let verdict = isolate_row(platform, url, self.dispatch(url, platform)).await;

        match &verdict.failure {
            None => debug!("[{}] passed: {}", platform, verdict.resolved_url),
            Some(failure) => debug!("[{}] failed: {} ({})", platform, url, failure),
        }
        verdict
    }

    async fn dispatch(&self, url: &str, platform: Platform) -> Verdict {
        match platform {
            Platform::DemandStar => self.validate_demandstar(url).await,
            Platform::Bonfire => {
                self.validate_portal(url, platform, &self.rules.bonfire.portal_suffix)
                    .await
            }
            Platform::IonWave => {
                self.validate_portal(url, platform, &self.rules.ionwave.sourcing_suffix)
                    .await
            }
            Platform::BidNetDirect | Platform::Generic => self.validate_listing(url, platform).await,
        }
    }

    async fn validate_demandstar(&self, url: &str) -> Verdict {
        let platform = Platform::DemandStar;
        let rules = &self.rules.demandstar;
        let request = RenderRequest::new(url).wait_for_any(
            &[rules.content_selector.as_str(), rules.heading_selector.as_str()],
            self.rules.render_timeout,
        );

        let page = match self.render(request).await {
            Ok(page) => page,
            Err(failure) => return Verdict::fail(platform, url, failure),
        };

        if page.wait_timed_out {
            warn!("Timed out waiting for {} to render, checking partial page", url);
        }

        let verdict = match check_demandstar_heading(&page.html, rules) {
            Ok(heading) => {
                debug!("Heading text: {}", heading);
                Verdict::pass(platform, url)
            }
            Err(failure) => Verdict::fail(platform, url, failure),
        };
        verdict.with_render_timeout(page.wait_timed_out)
    }

    /// Bonfire and IonWave: canonicalise to the platform's listing page and load it.
    async fn validate_portal(&self, url: &str, platform: Platform, suffix: &str) -> Verdict {
        let target = match rewrite_to_origin(url, suffix) {
            Ok(target) => target,
            Err(e) => return Verdict::fail(platform, url, ValidationFailure::Rewrite(e.to_string())),
        };
        debug!("[{}] Testing rewritten URL: {}", platform, target);

        let request = RenderRequest::new(target.as_str()).settle(self.rules.settle_delay);
        let page = match self.render(request).await {
            Ok(page) => page,
            Err(failure) => return Verdict::fail(platform, url, failure),
        };

        let content_check = match platform {
            Platform::Bonfire if self.rules.bonfire.verify_content => {
                check_bonfire_content(&page, &self.rules.bonfire, &self.rules.listing)
            }
            Platform::IonWave if self.rules.ionwave.verify_content => check_ionwave_content(&page, &self.rules.ionwave),
            _ => Ok(()),
        };

        match content_check {
            Ok(()) => Verdict::pass(platform, target),
            Err(failure) => Verdict::fail(platform, url, failure),
        }
    }

    /// BidNetDirect and every unrecognised platform.
    async fn validate_listing(&self, url: &str, platform: Platform) -> Verdict {
        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => return Verdict::fail(platform, url, ValidationFailure::Fetch(e.to_string())),
        };
        debug!("Resolved URL: {} (changed: {})", page.final_url, page.final_url != url);

        let title = &self.rules.listing.expected_title;
        if has_title_marker(&page.html, title) {
            Verdict::pass(platform, page.final_url)
        } else {
            Verdict::fail(
                platform,
                page.final_url,
                ValidationFailure::MissingTitleMarker { title: title.clone() },
            )
        }
    }

    async fn render(&self, request: RenderRequest) -> Result<RenderedPage, ValidationFailure> {
        let renderer = Arc::clone(&self.renderer);
        match tokio::task::spawn_blocking(move || renderer.render(&request)).await {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(e)) => Err(ValidationFailure::Render(e.to_string())),
            Err(e) if e.is_panic() => Err(ValidationFailure::Panicked(panic_message(e.into_panic().as_ref()))),
            Err(e) => Err(ValidationFailure::Render(format!("browser task cancelled: {}", e))),
        }
    }
}

/// Run one row's check, turning a panic anywhere in it into a failed verdict.
async fn isolate_row<F>(platform: Platform, url: &str, check: F) -> Verdict
where
    F: Future<Output = Verdict>,
{
    match AssertUnwindSafe(check).catch_unwind().await {
        Ok(verdict) => verdict,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!("Validation of {} panicked: {}", url, message);
            Verdict::fail(platform, url, ValidationFailure::Panicked(message))
        }
    }
}

/// The first heading's text must contain the expected header literal.
/// Returns the heading text on success.
pub fn check_demandstar_heading(html: &str, rules: &DemandStarRules) -> Result<String, ValidationFailure> {
    let selector = Selector::parse(&rules.heading_selector).map_err(|_| ValidationFailure::MissingHeading)?;
    let document = Html::parse_document(html);

    let heading = match document.select(&selector).next() {
        Some(heading) => heading,
        None => return Err(ValidationFailure::MissingHeading),
    };

    let text = stripped_text(heading);
    if text.contains(&rules.expected_header) {
        Ok(text)
    } else {
        Err(ValidationFailure::WrongHeading { found: text })
    }
}

/// Whether any element carries `title="<title>"` exactly.
pub fn has_title_marker(html: &str, title: &str) -> bool {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("[title]") else {
        return false;
    };
    let found = document
        .select(&selector)
        .any(|element| element.value().attr("title") == Some(title));
    found
}

/// Bonfire portal indicators: any one of them is enough.
pub fn check_bonfire_content(
    page: &RenderedPage,
    rules: &BonfireRules,
    listing: &ListingRules,
) -> Result<(), ValidationFailure> {
    if !page.final_url.contains(&rules.portal_suffix) {
        return Err(ValidationFailure::UnexpectedLocation {
            expected_suffix: rules.portal_suffix.clone(),
            found: page.final_url.clone(),
        });
    }

    let document = Html::parse_document(&page.html);
    let mentions_bonfire = |value: &str| value.to_lowercase().contains("bonfire");

    let attribute_hit = Selector::parse("[class], [id]")
        .map(|selector| {
            document.select(&selector).any(|element| {
                let value = element.value();
                value.attr("class").is_some_and(mentions_bonfire) || value.attr("id").is_some_and(mentions_bonfire)
            })
        })
        .unwrap_or(false);

    // Covers <title> text too
    let text_hit = document.root_element().text().any(mentions_bonfire);

    let title_marker_hit = has_title_marker(&page.html, &listing.expected_title);

    let heading_hit = Selector::parse("h1")
        .map(|selector| {
            document.select(&selector).any(|h1| {
                let text = h1.text().collect::<String>().to_lowercase();
                text.contains("opportunities") || text.contains("solicitations")
            })
        })
        .unwrap_or(false);

    if attribute_hit || text_hit || title_marker_hit || heading_hit {
        Ok(())
    } else {
        Err(ValidationFailure::MissingContent("no Bonfire page indicators found".to_string()))
    }
}

/// IonWave sourcing page: the header span must announce current opportunities.
pub fn check_ionwave_content(page: &RenderedPage, rules: &IonWaveRules) -> Result<(), ValidationFailure> {
    if !page.final_url.contains(&rules.sourcing_suffix) {
        return Err(ValidationFailure::UnexpectedLocation {
            expected_suffix: rules.sourcing_suffix.clone(),
            found: page.final_url.clone(),
        });
    }

    let document = Html::parse_document(&page.html);
    let header = Selector::parse("span[id]").ok().and_then(|selector| {
        document
            .select(&selector)
            .find(|span| span.value().id() == Some(rules.header_span_id.as_str()))
    });

    let Some(header) = header else {
        return Err(ValidationFailure::MissingContent(format!(
            "header span #{} not found",
            rules.header_span_id
        )));
    };

    let text = stripped_text(header);
    debug!("IonWave header: {}", text);
    if text.contains(&rules.expected_header) {
        Ok(())
    } else {
        Err(ValidationFailure::WrongHeading { found: text })
    }
}

/// Element text with each text node trimmed and the pieces joined directly.
fn stripped_text(element: scraper::ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
