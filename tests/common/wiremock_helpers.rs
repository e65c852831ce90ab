use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use std::time::Duration;

/// HTML for a solicitation listing page carrying the `title` marker.
pub fn listing_html(title: &str) -> String {
    format!(
        r#"<html><head><title>Bids</title></head><body>
        <div class="solicitations" title="{}"><a href="/bid/1">Paving</a></div>
        </body></html>"#,
        title
    )
}

/// Creates a mock HTTP server that serves HTML content at the specified path.
pub async fn mock_html_page(url_path: &str, html: &str) -> MockServer {
    let server = MockServer::start().await;
    mount_html(&server, url_path, html).await;
    server
}

/// Mount an HTML page on an existing server.
pub async fn mount_html(server: &MockServer, url_path: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Mount a 302 from `from_path` to `to_path` on the same server.
pub async fn mount_redirect(server: &MockServer, from_path: &str, to_path: &str) {
    Mock::given(method("GET"))
        .and(path(from_path))
        .respond_with(ResponseTemplate::new(302).insert_header("location", to_path))
        .mount(server)
        .await;
}

/// Creates a mock HTTP server that delays responses to simulate network timeouts.
///
/// The server will wait for `delay_ms` milliseconds before responding with a 200 OK.
pub async fn mock_timeout_server(delay_ms: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("delayed response")
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(&server)
        .await;

    server
}

/// Creates a mock HTTP server that returns the specified HTTP error status code.
///
/// Useful for testing error handling for 4xx and 5xx responses.
pub async fn mock_error_server(status_code: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status_code))
        .mount(&server)
        .await;

    server
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_html_page_serves_listing() {
        let server = mock_html_page("/open", &listing_html("Open Solicitations")).await;

        let response = reqwest::get(format!("{}/open", server.uri())).await.unwrap();

        assert_eq!(response.status(), 200);
        let body = response.text().await.unwrap();
        assert!(body.contains(r#"title="Open Solicitations""#));
    }

    #[tokio::test]
    async fn test_mock_error_server_returns_status_code() {
        let server = mock_error_server(503).await;

        let response = reqwest::get(format!("{}/any-path", server.uri())).await.unwrap();

        assert_eq!(response.status(), 503);
    }
}
