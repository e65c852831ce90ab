//! Dispatcher tests against a fake renderer and wiremock servers.
//!
//! Browser-backed platforms (DemandStar, Bonfire, IonWave) go through
//! `FixtureRenderer`; BidNetDirect and Generic rows hit a local mock server.

mod common;

use common::wiremock_helpers::{listing_html, mock_error_server, mock_html_page, mock_timeout_server, mount_html, mount_redirect};
use rfp_link_validator::browser::{PageRenderer, RenderError, RenderRequest, RenderedPage};
use rfp_link_validator::config::AppConfig;
use rfp_link_validator::{FixtureRenderer, LinkValidator, Platform, ValidationFailure};
use std::sync::Arc;
use wiremock::MockServer;

const DEMANDSTAR_URL: &str = "https://www.demandstar.com/app/agencies/washington/city-of-x/procurement-opportunities/abc";

fn test_config() -> AppConfig {
    let mut config = AppConfig::default_template().expect("embedded config is valid");
    config.http.request_timeout_secs = 1;
    config
}

fn validator_with(renderer: Arc<dyn PageRenderer>) -> LinkValidator {
    LinkValidator::from_config(&test_config(), renderer).expect("HTTP client builds")
}

fn fetch_only_validator() -> LinkValidator {
    validator_with(Arc::new(FixtureRenderer::new()))
}

// ─────────────────────────────────────────────────────────────────────────────
// BidNetDirect / Generic
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_generic_listing_with_title_marker_passes() {
    let server = mock_html_page("/open", &listing_html("Open Solicitations")).await;
    let url = format!("{}/open", server.uri());

    let verdict = fetch_only_validator().validate(&url, "Generic").await;

    assert!(verdict.passed, "{:?}", verdict.failure);
    assert_eq!(verdict.platform, Platform::Generic);
    assert_eq!(verdict.resolved_url, url);
}

#[tokio::test]
async fn test_unknown_label_behaves_like_generic() {
    let server = mock_html_page("/open", &listing_html("Open Solicitations")).await;
    let url = format!("{}/open", server.uri());
    let validator = fetch_only_validator();

    let generic = validator.validate(&url, "Generic").await;
    let unknown = validator.validate(&url, "  Periscope ").await;

    assert_eq!(unknown.platform, Platform::Generic);
    assert_eq!(unknown.passed, generic.passed);
    assert_eq!(unknown.resolved_url, generic.resolved_url);
}

#[tokio::test]
async fn test_bidnetdirect_redirect_returns_final_url() {
    let server = MockServer::start().await;
    mount_redirect(&server, "/agency/bids", "/agency/bids/open").await;
    mount_html(&server, "/agency/bids/open", &listing_html("Open Solicitations")).await;

    let verdict = fetch_only_validator()
        .validate(&format!("{}/agency/bids", server.uri()), "BidNetDirect")
        .await;

    assert!(verdict.passed, "{:?}", verdict.failure);
    assert_eq!(verdict.platform, Platform::BidNetDirect);
    assert_eq!(verdict.resolved_url, format!("{}/agency/bids/open", server.uri()));
}

#[tokio::test]
async fn test_listing_title_marker_must_match_exactly() {
    let server = mock_html_page("/closed", &listing_html("Closed Solicitations")).await;
    let url = format!("{}/closed", server.uri());

    let verdict = fetch_only_validator().validate(&url, "bidnetdirect").await;

    assert!(!verdict.passed);
    assert!(matches!(verdict.failure, Some(ValidationFailure::MissingTitleMarker { .. })));
    assert_eq!(verdict.resolved_url, url);
}

#[tokio::test]
async fn test_listing_http_error_fails_with_original_url() {
    let server = mock_error_server(404).await;
    let url = format!("{}/gone", server.uri());

    let verdict = fetch_only_validator().validate(&url, "Generic").await;

    assert!(!verdict.passed);
    assert!(matches!(verdict.failure, Some(ValidationFailure::Fetch(_))));
    assert_eq!(verdict.resolved_url, url);
}

#[tokio::test]
async fn test_listing_timeout_fails_with_original_url() {
    let server = mock_timeout_server(3_000).await;
    let url = format!("{}/slow", server.uri());

    let verdict = fetch_only_validator().validate(&url, "Generic").await;

    assert!(!verdict.passed);
    assert!(matches!(verdict.failure, Some(ValidationFailure::Fetch(_))));
    assert_eq!(verdict.resolved_url, url);
}

#[tokio::test]
async fn test_unreachable_host_is_a_failed_verdict() {
    let verdict = fetch_only_validator().validate("http://127.0.0.1:1/bids", "Generic").await;

    assert!(!verdict.passed);
    assert_eq!(verdict.resolved_url, "http://127.0.0.1:1/bids");
}

// ─────────────────────────────────────────────────────────────────────────────
// Bonfire / IonWave
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ionwave_requests_rewritten_sourcing_page() {
    let target = "http://x.org/SourcingEvents.aspx?SourceType=1";
    let renderer = Arc::new(FixtureRenderer::new().with_page(target, "<html><body>Loaded</body></html>"));
    let validator = validator_with(renderer.clone());

    let verdict = validator.validate("http://x.org/sched", "IonWave").await;

    assert!(verdict.passed, "{:?}", verdict.failure);
    assert_eq!(verdict.resolved_url, target);
    assert_eq!(renderer.requested_urls(), vec![target.to_string()]);
}

#[tokio::test]
async fn test_bonfire_passes_with_portal_url() {
    let target = "https://county.bonfirehub.com/portal/?tab=openOpportunities";
    let renderer = Arc::new(FixtureRenderer::new().with_page(target, "<html><body>Portal</body></html>"));
    let validator = validator_with(renderer.clone());

    let verdict = validator
        .validate("https://county.bonfirehub.com/opportunities/12345", "Bonfire")
        .await;

    assert!(verdict.passed);
    assert_eq!(verdict.platform, Platform::Bonfire);
    assert_eq!(verdict.resolved_url, target);
    assert_eq!(renderer.requests()[0].settle_delay, validator.rules().settle_delay);
}

#[tokio::test]
async fn test_bonfire_render_failure_keeps_original_url() {
    let original = "https://county.bonfirehub.com/opportunities/12345";
    let renderer = Arc::new(
        FixtureRenderer::new()
            .with_failure("https://county.bonfirehub.com/portal/?tab=openOpportunities", "net::ERR_CONNECTION_RESET"),
    );

    let verdict = validator_with(renderer).validate(original, "Bonfire").await;

    assert!(!verdict.passed);
    assert!(matches!(verdict.failure, Some(ValidationFailure::Render(_))));
    assert_eq!(verdict.resolved_url, original);
}

#[tokio::test]
async fn test_portal_url_without_host_fails_before_rendering() {
    let renderer = Arc::new(FixtureRenderer::new());
    let validator = validator_with(renderer.clone());

    let verdict = validator.validate("not a url", "Bonfire").await;

    assert!(!verdict.passed);
    assert!(matches!(verdict.failure, Some(ValidationFailure::Rewrite(_))));
    assert_eq!(verdict.resolved_url, "not a url");
    assert!(renderer.requested_urls().is_empty());
}

#[tokio::test]
async fn test_bonfire_content_check_when_enabled() {
    let target = "https://county.bonfirehub.com/portal/?tab=openOpportunities";
    let renderer = Arc::new(FixtureRenderer::new().with_page(target, "<html><body><p>Nothing here</p></body></html>"));
    let mut config = test_config();
    config.platforms.bonfire.verify_content = true;
    let validator = LinkValidator::from_config(&config, renderer).unwrap();

    let verdict = validator
        .validate("https://county.bonfirehub.com/opportunities/1", "Bonfire")
        .await;

    assert!(!verdict.passed);
    assert!(matches!(verdict.failure, Some(ValidationFailure::MissingContent(_))));
}

#[tokio::test]
async fn test_ionwave_content_check_when_enabled() {
    let target = "https://city.ionwave.net/SourcingEvents.aspx?SourceType=1";
    let html = r#"<html><body><span id="ctl00_mainContent_lblPageHeader"> Current Bid Opportunities </span></body></html>"#;
    let renderer = Arc::new(FixtureRenderer::new().with_page(target, html));
    let mut config = test_config();
    config.platforms.ionwave.verify_content = true;
    let validator = LinkValidator::from_config(&config, renderer).unwrap();

    let verdict = validator.validate("https://city.ionwave.net/Login.aspx", "IonWave").await;

    assert!(verdict.passed, "{:?}", verdict.failure);
    assert_eq!(verdict.resolved_url, target);
}

// ─────────────────────────────────────────────────────────────────────────────
// DemandStar
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_demandstar_expected_heading_passes() {
    let html = r#"<html><body>
        <h1>Bids &amp; RFPs | OpenBids</h1>
        <div class="listGroupWrapper clearfix"><div>Road Repair</div></div>
        </body></html>"#;
    let renderer = Arc::new(FixtureRenderer::new().with_page(DEMANDSTAR_URL, html));
    let validator = validator_with(renderer.clone());

    let verdict = validator.validate(DEMANDSTAR_URL, "DemandStar").await;

    assert!(verdict.passed, "{:?}", verdict.failure);
    assert_eq!(verdict.resolved_url, DEMANDSTAR_URL);
    assert!(!verdict.render_timed_out);
    assert_eq!(
        renderer.requests()[0].wait_for,
        vec!["div.listGroupWrapper.clearfix".to_string(), "h1".to_string()]
    );
}

#[tokio::test]
async fn test_demandstar_wrong_heading_fails() {
    let html = "<html><body><h1>Page Not Found</h1></body></html>";
    let renderer = Arc::new(FixtureRenderer::new().with_page(DEMANDSTAR_URL, html));

    let verdict = validator_with(renderer).validate(DEMANDSTAR_URL, "DemandStar").await;

    assert!(!verdict.passed);
    assert_eq!(
        verdict.failure,
        Some(ValidationFailure::WrongHeading {
            found: "Page Not Found".to_string()
        })
    );
    assert_eq!(verdict.resolved_url, DEMANDSTAR_URL);
}

#[tokio::test]
async fn test_demandstar_partial_page_reports_missing_heading_and_timeout() {
    let html = "<html><body><p>Loading...</p></body></html>";
    let renderer = Arc::new(FixtureRenderer::new().with_page(DEMANDSTAR_URL, html));

    let verdict = validator_with(renderer).validate(DEMANDSTAR_URL, "demandstar").await;

    assert!(!verdict.passed);
    assert_eq!(verdict.failure, Some(ValidationFailure::MissingHeading));
    assert!(verdict.render_timed_out);
}

#[tokio::test]
async fn test_demandstar_final_url_is_not_persisted() {
    let html = "<html><body><h1>Bids &amp; RFPs | OpenBids</h1></body></html>";
    let renderer = Arc::new(FixtureRenderer::new().with_redirected_page(
        DEMANDSTAR_URL,
        "https://www.demandstar.com/app/limited/bids",
        html,
    ));

    let verdict = validator_with(renderer).validate(DEMANDSTAR_URL, "DemandStar").await;

    assert!(verdict.passed);
    assert_eq!(verdict.resolved_url, DEMANDSTAR_URL);
}

// ─────────────────────────────────────────────────────────────────────────────
// Fault isolation
// ─────────────────────────────────────────────────────────────────────────────

struct PanickingRenderer;

impl PageRenderer for PanickingRenderer {
    fn render(&self, _request: &RenderRequest) -> Result<RenderedPage, RenderError> {
        panic!("renderer exploded");
    }
}

#[tokio::test]
async fn test_renderer_panic_becomes_failed_verdict() {
    let validator = validator_with(Arc::new(PanickingRenderer));

    let verdict = validator.validate(DEMANDSTAR_URL, "DemandStar").await;

    assert!(!verdict.passed);
    assert_eq!(verdict.resolved_url, DEMANDSTAR_URL);
    match verdict.failure {
        Some(ValidationFailure::Panicked(message)) => assert!(message.contains("renderer exploded")),
        other => panic!("expected a panic failure, got {:?}", other),
    }

    // The validator is still usable afterwards
    let again = validator.validate("https://a.bonfirehub.com/x", "Bonfire").await;
    assert!(matches!(again.failure, Some(ValidationFailure::Panicked(_))));
}
