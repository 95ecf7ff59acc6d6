//! Challenge detection on fetched pages.

use regex::Regex;
use scraper::{Html, Selector};

use super::CaptchaChallenge;

/// Find a v2 challenge in `html`, fetched from `page_url`
///
/// Looks for a `data-sitekey` attribute first, then for the widget script
/// URL carrying the key as `k=`.
pub fn scrape_challenge(html: &str, page_url: &str) -> Option<CaptchaChallenge> {
    site_key_attribute(html)
        .or_else(|| site_key_from_script(html))
        .map(|key| CaptchaChallenge::recaptcha_v2(key, page_url))
}

fn site_key_attribute(html: &str) -> Option<String> {
    let selector = Selector::parse("[data-sitekey]").ok()?;
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("data-sitekey"))
        .map(str::trim)
        .find(|key| !key.is_empty())
        .map(str::to_string)
}

fn site_key_from_script(html: &str) -> Option<String> {
    let re = Regex::new(r#"(?s)google\.com/recaptcha.*?k=([^&"']+)"#).ok()?;
    re.captures(html).map(|caps| caps[1].to_string())
}
