//! Domain heuristics used to map pages and site names to records

/// URL schemes that never map to a site
const IGNORED_SCHEMES: &[&str] = &["about:", "resource:", "moz-extension:"];

/// Reduce a page URL to the domain sites are stored under
///
/// Keeps the last two host labels, or three when the second-to-last label is
/// `co` (`example.co.uk`).
pub fn extract_domain(url: &str) -> String {
    if IGNORED_SCHEMES.iter().any(|s| url.starts_with(s)) {
        return String::new();
    }

    let host = host_of(url);
    let labels: Vec<&str> = host.split('.').collect();
    let significant = if labels.len() > 2 && labels[labels.len() - 2].eq_ignore_ascii_case("co") {
        3
    } else {
        2
    };

    let skip = labels.len().saturating_sub(significant);
    labels[skip..].join(".")
}

/// Host part of a URL, without scheme, credentials, port or path
fn host_of(url: &str) -> &str {
    let rest = match url.find("://") {
        Some(pos) => &url[pos + 3..],
        None => url,
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host = authority.rsplit('@').next().unwrap_or(authority);
    host.split(':').next().unwrap_or(host)
}

/// Domain guess for a site name: the text after the last `@`, or the name itself
///
/// Never empty for a non-empty sitename; a trailing `@` falls back to the
/// whole name.
pub fn sitesearch(sitename: &str) -> &str {
    match sitename.rsplit_once('@') {
        Some((_, domain)) if !domain.is_empty() => domain,
        _ => sitename,
    }
}
