//! Open-tracking pixel embedding.

use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

/// Whether `html` already references `pixel_url` from an `<img>` tag.
pub fn has_pixel(html: &str, pixel_url: &Url) -> bool {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("img[src]") else {
        return false;
    };

    let found = document
        .select(&selector)
        .filter_map(|img| img.value().attr("src"))
        .any(|src| src.trim() == pixel_url.as_str());

    debug!(pixel_url = %pixel_url, found = found, "tracking_pixel_lookup");
    found
}

/// Embed the tracking pixel into a template.
///
/// The tag goes right before the last `</body>` (any case), or at the end
/// when the template has no body element. Templates that already reference
/// the pixel are returned unchanged.
pub fn embed_pixel(html: &str, pixel_url: &Url) -> String {
    if has_pixel(html, pixel_url) {
        info!(pixel_url = %pixel_url, "tracking_pixel_already_present");
        return html.to_string();
    }

    let tag = pixel_tag(pixel_url);
    let mut out = String::with_capacity(html.len() + tag.len());

    match html.to_ascii_lowercase().rfind("</body>") {
        Some(pos) => {
            out.push_str(&html[..pos]);
            out.push_str(&tag);
            out.push_str(&html[pos..]);
        }
        None => {
            out.push_str(html);
            out.push_str(&tag);
        }
    }

    info!(pixel_url = %pixel_url, "tracking_pixel_embedded");
    out
}

fn pixel_tag(pixel_url: &Url) -> String {
    let src = pixel_url.as_str().replace('&', "&amp;").replace('"', "&quot;");
    format!(r#"<img src="{}" width="1" height="1" alt="" style="display:none" />"#, src)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel() -> Url {
        Url::parse("https://track.example.com/open.png").unwrap()
    }

    #[test]
    fn test_embed_before_body_close() {
        let html = "<html><body><p>Hi</p></BODY></html>";
        let out = embed_pixel(html, &pixel());
        assert_eq!(
            out,
            "<html><body><p>Hi</p><img src=\"https://track.example.com/open.png\" width=\"1\" height=\"1\" alt=\"\" style=\"display:none\" /></BODY></html>"
        );
    }

    #[test]
    fn test_embed_appends_without_body() {
        let out = embed_pixel("<p>Hi</p>", &pixel());
        assert!(out.starts_with("<p>Hi</p><img src="));
        assert!(has_pixel(&out, &pixel()));
    }

    #[test]
    fn test_embed_is_idempotent() {
        let once = embed_pixel("<html><body>x</body></html>", &pixel());
        let twice = embed_pixel(&once, &pixel());
        assert_eq!(once, twice);
        assert_eq!(twice.matches("<img").count(), 1);
    }

    #[test]
    fn test_has_pixel_ignores_other_images() {
        let html = r#"<img src="https://cdn.example.com/logo.png">"#;
        assert!(!has_pixel(html, &pixel()));
    }

    #[test]
    fn test_query_string_is_escaped_and_detected() {
        let url = Url::parse("https://track.example.com/open?c=1&d=2").unwrap();
        let out = embed_pixel("<body></body>", &url);
        assert!(out.contains("open?c=1&amp;d=2"));
        assert!(has_pixel(&out, &url));
    }
}
