use ammonia;

/// Clean HTML content using the ammonia library.
///
/// Question stems and rationales are admin-authored and may carry light
/// markup (<b>, <p>, lists); this whitelist-based sanitization keeps those
/// while stripping dangerous tags (<script>, <iframe>) and malicious
/// attributes (onclick). Fail-safe against stored XSS reaching candidates.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
