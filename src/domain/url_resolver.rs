//! Turns link fragments found on a catalog page into canonical absolute URLs.

use std::collections::HashSet;

use url::Url;

use crate::error::ResolveError;

/// Canonicalization options applied after a link is made absolute.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Query parameters removed from the result (session ids, trackers).
    pub strip_params: HashSet<String>,
    /// Drop the `#fragment` component.
    pub strip_fragment: bool,
}

impl ResolveOptions {
    /// Builds options from a list of parameter names.
    #[must_use]
    pub fn new<I, S>(strip_params: I, strip_fragment: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            strip_params: strip_params.into_iter().map(Into::into).collect(),
            strip_fragment,
        }
    }
}

/// Resolves `link` as found on `page_url`.
///
/// * blank input yields `Ok(None)`
/// * `./rest` is appended to the parent directory of the page path
/// * `http://` / `https://` links are taken as they are
/// * anything else is treated as path-absolute on the page's origin
///
/// # Errors
///
/// Returns [`ResolveError::Malformed`] when the page URL or the resulting
/// link cannot be parsed.
pub fn resolve(
    link: &str,
    page_url: &Url,
    options: &ResolveOptions,
) -> Result<Option<Url>, ResolveError> {
    let link = link.trim();
    if link.is_empty() {
        return Ok(None);
    }

    let origin = page_url.origin().ascii_serialization();
    let absolute = if let Some(rest) = link.strip_prefix("./") {
        let dir = match page_url.path().rsplit_once('/') {
            Some((dir, _)) => dir,
            None => "",
        };
        format!("{origin}{dir}/{rest}")
    } else if link.starts_with("http://") || link.starts_with("https://") {
        link.to_string()
    } else if link.starts_with('/') {
        format!("{origin}{link}")
    } else {
        format!("{origin}/{link}")
    };

    let mut url = Url::parse(&absolute).map_err(|e| ResolveError::Malformed {
        link: absolute.clone(),
        reason: e.to_string(),
    })?;

    strip_query_params(&mut url, &options.strip_params);
    if options.strip_fragment {
        url.set_fragment(None);
    }

    Ok(Some(url))
}

fn strip_query_params(url: &mut Url, strip: &HashSet<String>) {
    if strip.is_empty() || url.query().is_none() {
        return;
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let kept: Vec<&(String, String)> = pairs.iter().filter(|(k, _)| !strip.contains(k)).collect();

    // Untouched queries keep their original encoding.
    if kept.len() == pairs.len() {
        return;
    }

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
}
