use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // The portal renders "next page" links as
    //   javascript:__doPostBack('<target>','<argument>')
    // This grammar is the one quirk of the site; do not generalize it.
    static ref POSTBACK_RE: Regex = Regex::new(r"__doPostBack\('([^']*)','([^']*)'\)").unwrap();
}

/// Extracts the (event target, event argument) pair from a pager anchor's
/// href. Returns `None` when the href does not follow the postback grammar.
pub fn parse_postback_href(href: &str) -> Option<(String, String)> {
    POSTBACK_RE
        .captures(href)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
}
