use std::time::Duration;

use common::error::AppError;
use dom_smoothie::{Article, Readability, TextMode};
use tracing::{info, warn};

/// Fetches a page and reduces it to its readable article text.
pub async fn extract_text_from_url(url: &str) -> Result<String, AppError> {
    let parsed =
        url::Url::parse(url).map_err(|_| AppError::Validation("Invalid URL".to_string()))?;
    ensure_ingestion_url_allowed(&parsed)?;

    info!("Fetching URL: {}", url);

    let client = reqwest::ClientBuilder::new()
        .timeout(Duration::from_secs(30))
        .build()?;
    let raw_content = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let config = dom_smoothie::Config {
        text_mode: TextMode::Markdown,
        ..Default::default()
    };
    let mut readability = Readability::new(raw_content, Some(url), Some(config))?;
    let article: Article = readability.parse()?;

    let text: String = article.text_content.into();
    if text.trim().is_empty() {
        return Err(AppError::Processing(format!(
            "No readable content extracted from {url}"
        )));
    }

    Ok(text)
}

fn ensure_ingestion_url_allowed(url: &url::Url) -> Result<(), AppError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            warn!(%url, %scheme, "Rejected ingestion URL due to unsupported scheme");
            return Err(AppError::Validation(
                "Unsupported URL scheme for ingestion".to_string(),
            ));
        }
    }

    let Some(host) = url.host_str() else {
        warn!(%url, "Rejected ingestion URL missing host");
        return Err(AppError::Validation(
            "URL is missing a host component".to_string(),
        ));
    };

    if host.eq_ignore_ascii_case("localhost") {
        warn!(%url, host, "Rejected ingestion URL to localhost");
        return Err(AppError::Validation(
            "Ingestion URL host is not allowed".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_scheme() {
        let url = url::Url::parse("ftp://example.com").expect("url");
        assert!(ensure_ingestion_url_allowed(&url).is_err());
    }

    #[test]
    fn rejects_localhost() {
        let url = url::Url::parse("http://localhost/resource").expect("url");
        assert!(ensure_ingestion_url_allowed(&url).is_err());
    }

    #[test]
    fn allows_public_domain() {
        let url = url::Url::parse("https://www.rfc-editor.org/rfc/rfc6749.html").expect("url");
        assert!(ensure_ingestion_url_allowed(&url).is_ok());
    }
}
