//! HTML parsing for the forum pages.
//!
//! `scraper::Html` is not `Send`, so every function here takes the page as a
//! string and returns owned data; nothing parsed is held across an await.

use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use super::ConnectorError;
use crate::selection::RawResult;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        static $name: Lazy<Selector> = Lazy::new(|| Selector::parse($css).unwrap());
    };
}

selector!(FORM_SELECTOR, "form");
selector!(FIELD_SELECTOR, "input[name], textarea[name], button[name]");
selector!(USERNAME_SELECTOR, "input[name='username']");
selector!(SEARCH_BOX_SELECTOR, "#scform_srchtxt");
selector!(LIST_ITEM_SELECTOR, "li");
selector!(ANCHOR_SELECTOR, "a[href]");
selector!(LOGOUT_SELECTOR, "a[href*='action=logout']");
selector!(DETAIL_SELECTOR, ".plc, .cl");

/// Text on the post-login redirect notice.
const LOGIN_REDIRECT_TEXT: &str = "跳转";

/// Form submission method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

/// A form ready to be submitted: resolved action, method, and the default
/// values of every named field.
#[derive(Debug, Clone)]
pub struct FormSpec {
    pub action: Url,
    pub method: FormMethod,
    pub fields: Vec<(String, String)>,
}

impl FormSpec {
    /// Set a field, adding it if the form did not carry it.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.fields.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_form(form: ElementRef<'_>, page_url: &Url) -> Result<FormSpec, ConnectorError> {
    let action = match form.value().attr("action").map(str::trim) {
        Some(action) if !action.is_empty() => page_url
            .join(action)
            .map_err(|e| ConnectorError::ElementNotFound(format!("form action {}: {}", action, e)))?,
        _ => page_url.clone(),
    };

    let method = match form.value().attr("method") {
        Some(m) if m.eq_ignore_ascii_case("post") => FormMethod::Post,
        _ => FormMethod::Get,
    };

    let mut fields = Vec::new();
    for field in form.select(&FIELD_SELECTOR) {
        let element = field.value();
        let Some(name) = element.attr("name") else {
            continue;
        };
        let kind = element.attr("type").unwrap_or_default();
        if kind.eq_ignore_ascii_case("checkbox") && element.attr("checked").is_none() {
            continue;
        }
        let value = match element.name() {
            "button" => element.attr("value").unwrap_or("true").to_string(),
            "textarea" => element_text(&field),
            _ => element.attr("value").unwrap_or_default().to_string(),
        };
        fields.push((name.to_string(), value));
    }

    Ok(FormSpec {
        action,
        method,
        fields,
    })
}

/// Locate the login form (the one holding a `username` input).
pub fn parse_login_form(html: &str, page_url: &Url) -> Result<FormSpec, ConnectorError> {
    let document = Html::parse_document(html);
    let form = document
        .select(&FORM_SELECTOR)
        .find(|form| form.select(&USERNAME_SELECTOR).next().is_some())
        .ok_or_else(|| ConnectorError::ElementNotFound("login form".to_string()))?;
    build_form(form, page_url)
}

/// Locate the search form and the name of its text box.
pub fn parse_search_form(html: &str, page_url: &Url) -> Result<(FormSpec, String), ConnectorError> {
    let document = Html::parse_document(html);
    let search_box = document
        .select(&SEARCH_BOX_SELECTOR)
        .next()
        .ok_or_else(|| ConnectorError::ElementNotFound("search box #scform_srchtxt".to_string()))?;
    let field_name = search_box
        .value()
        .attr("name")
        .unwrap_or("srchtxt")
        .to_string();

    let form = search_box
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "form")
        .ok_or_else(|| ConnectorError::ElementNotFound("search form".to_string()))?;

    Ok((build_form(form, page_url)?, field_name))
}

/// Whether a page shows the signs of an authenticated session.
pub fn is_logged_in(html: &str) -> bool {
    let document = Html::parse_document(html);
    if document.select(&LOGOUT_SELECTOR).next().is_some() {
        return true;
    }
    document
        .select(&ANCHOR_SELECTOR)
        .any(|a| element_text(&a).contains(LOGIN_REDIRECT_TEXT))
}

/// Every `li` holding a link, in page order, as raw results.
pub fn parse_search_results(html: &str, page_url: &Url) -> Vec<RawResult> {
    let document = Html::parse_document(html);
    let mut results = Vec::new();

    for item in document.select(&LIST_ITEM_SELECTOR) {
        let Some(anchor) = item.select(&ANCHOR_SELECTOR).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(link) = page_url.join(href.trim()) else {
            continue;
        };
        let text = element_text(&anchor);
        if text.is_empty() {
            continue;
        }
        results.push(RawResult::new(text, link.to_string()));
    }

    results
}

/// Whether a page is a thread detail page.
pub fn is_detail_page(html: &str) -> bool {
    Html::parse_document(html)
        .select(&DETAIL_SELECTOR)
        .next()
        .is_some()
}

/// First link whose text mentions "torrent", resolved against the page.
pub fn find_torrent_anchor(html: &str, page_url: &Url) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR_SELECTOR)
        .filter(|a| element_text(a).to_lowercase().contains("torrent"))
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| page_url.join(href.trim()).ok())
        .map(|url| url.to_string())
}

/// File name from a `Content-Disposition` header value.
///
/// Prefers the RFC 5987 `filename*` form over plain `filename`.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    for part in value.split(';').map(str::trim) {
        if let Some(encoded) = part.strip_prefix("filename*=") {
            let encoded = encoded.trim_matches('"');
            let encoded = match encoded.split_once("''") {
                Some((_charset, rest)) => rest,
                None => encoded,
            };
            if let Ok(decoded) = urlencoding::decode(encoded) {
                if !decoded.is_empty() {
                    return Some(decoded.into_owned());
                }
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            let name = name.trim_matches('"');
            if !name.is_empty() {
                plain = Some(name.to_string());
            }
        }
    }
    plain
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://forum.example/forum.php?mod=forumdisplay").unwrap()
    }

    const LOGIN_PAGE: &str = r#"
<html><body>
  <form method="post" action="member.php?mod=logging&amp;action=login&amp;loginsubmit=yes" id="loginform">
    <input type="hidden" name="formhash" value="abc123">
    <input type="text" name="username" value="">
    <input type="password" name="password" value="">
    <input type="checkbox" name="cookietime" value="2592000">
    <button type="submit" name="loginsubmit" value="true">登录</button>
  </form>
</body></html>"#;

    #[test]
    fn test_parse_login_form() {
        let form = parse_login_form(LOGIN_PAGE, &base()).unwrap();
        assert_eq!(form.method, FormMethod::Post);
        assert_eq!(
            form.action.as_str(),
            "https://forum.example/member.php?mod=logging&action=login&loginsubmit=yes"
        );
        assert_eq!(form.get("formhash"), Some("abc123"));
        assert_eq!(form.get("loginsubmit"), Some("true"));
        // Unchecked checkboxes are not submitted.
        assert_eq!(form.get("cookietime"), None);
    }

    #[test]
    fn test_parse_login_form_missing() {
        let result = parse_login_form("<html><body>maintenance</body></html>", &base());
        assert!(matches!(result, Err(ConnectorError::ElementNotFound(_))));
    }

    #[test]
    fn test_form_set_overrides_and_appends() {
        let mut form = parse_login_form(LOGIN_PAGE, &base()).unwrap();
        form.set("username", "alice");
        form.set("questionid", "0");
        assert_eq!(form.get("username"), Some("alice"));
        assert_eq!(form.get("questionid"), Some("0"));
    }

    #[test]
    fn test_parse_search_form() {
        let html = r#"
<form id="scbar_form" method="post" action="search.php?searchsubmit=yes">
  <input type="hidden" name="mod" value="forum">
  <input type="text" name="srchtxt" id="scform_srchtxt" value="">
</form>"#;
        let (form, field) = parse_search_form(html, &base()).unwrap();
        assert_eq!(field, "srchtxt");
        assert_eq!(form.get("mod"), Some("forum"));
        assert_eq!(form.action.as_str(), "https://forum.example/search.php?searchsubmit=yes");
    }

    #[test]
    fn test_parse_search_form_missing_box() {
        let result = parse_search_form("<form></form>", &base());
        assert!(matches!(result, Err(ConnectorError::ElementNotFound(_))));
    }

    #[test]
    fn test_is_logged_in() {
        assert!(is_logged_in(
            r#"<p>欢迎您回来 <a href="forum.php">如果您的浏览器没有自动跳转，请点击此链接</a></p>"#
        ));
        assert!(is_logged_in(
            r#"<a href="member.php?mod=logging&action=logout&formhash=x">退出</a>"#
        ));
        assert!(!is_logged_in(LOGIN_PAGE));
    }

    #[test]
    fn test_parse_search_results_in_page_order() {
        let html = r#"
<ul>
  <li class="pbw"><h3><a href="thread-1-1-1.html">Foo   [第5-6集]
      1080p</a></h3></li>
  <li>no link here</li>
  <li><a href="https://other.example/thread-2.html">Foo [第7集] 1080p</a></li>
  <li><a href="thread-3.html"></a></li>
</ul>"#;
        let results = parse_search_results(html, &base());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].display_text, "Foo [第5-6集] 1080p");
        assert_eq!(results[0].link, "https://forum.example/thread-1-1-1.html");
        assert_eq!(results[1].link, "https://other.example/thread-2.html");
    }

    #[test]
    fn test_is_detail_page() {
        assert!(is_detail_page(r#"<div class="plc">post</div>"#));
        assert!(is_detail_page(r#"<div class="cl">post</div>"#));
        assert!(!is_detail_page(r#"<div class="error">gone</div>"#));
    }

    #[test]
    fn test_find_torrent_anchor() {
        let html = r#"
<div class="plc">
  <a href="home.php">home</a>
  <a href="forum.php?mod=attachment&aid=XYZ">Foo.S01E05.1080p.Torrent</a>
</div>"#;
        let page = Url::parse("https://forum.example/thread-1.html").unwrap();
        assert_eq!(
            find_torrent_anchor(html, &page).as_deref(),
            Some("https://forum.example/forum.php?mod=attachment&aid=XYZ")
        );
        assert_eq!(find_torrent_anchor("<a href='x'>nothing</a>", &page), None);
    }

    #[test]
    fn test_filename_from_disposition() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="foo.torrent""#).as_deref(),
            Some("foo.torrent")
        );
        assert_eq!(
            filename_from_disposition(
                "attachment; filename=\"fallback.torrent\"; filename*=UTF-8''%E7%AC%AC5%E9%9B%86.torrent"
            )
            .as_deref(),
            Some("第5集.torrent")
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }
}
