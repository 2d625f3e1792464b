use scraper::{Html, Selector};
use std::collections::HashMap;

use crate::scraping::error_handling::ScrapeError;
use crate::scraping::models::SessionState;

/// Hidden fields the server requires on every postback. A page missing any
/// of these is malformed and the walk cannot continue from it.
pub const REQUIRED_FIELDS: [&str; 3] = ["__VIEWSTATE", "__EVENTVALIDATION", "__VIEWSTATEGENERATOR"];

/// Hidden fields the portal sometimes renders. The server expects the keys
/// to exist on replay even when empty, so absent ones resolve to `""`
/// instead of being dropped from the bag.
pub const OPTIONAL_FIELDS: [&str; 5] = [
    "__VIEWSTATEENCRYPTED",
    "hfRfcRec",
    "hfRfcEmi",
    "hfInvoca",
    "hfItu",
];

/// Which hidden fields a run replays. `Strict` carries only the required
/// trio; `Extended` additionally probes the optional set and is the
/// canonical choice for production runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSet {
    Strict,
    Extended,
}

/// Extracts the session-continuation fields from a listing page body.
/// Pure function of the response body.
pub fn extract_session_state(html: &str, field_set: FieldSet) -> Result<SessionState, ScrapeError> {
    let document = Html::parse_document(html);
    extract_from_document(&document, field_set)
}

pub(crate) fn extract_from_document(
    document: &Html,
    field_set: FieldSet,
) -> Result<SessionState, ScrapeError> {
    let input_selector = Selector::parse("input").unwrap();

    let mut inputs: HashMap<String, String> = HashMap::new();
    for element in document.select(&input_selector) {
        let value = element.value();
        if let (Some(name), Some(val)) = (value.attr("name"), value.attr("value")) {
            inputs.insert(name.to_string(), val.to_string());
        }
    }

    let mut state = SessionState::new();
    for field in REQUIRED_FIELDS {
        let value = inputs
            .get(field)
            .ok_or_else(|| ScrapeError::MissingViewState {
                field: field.to_string(),
            })?;
        state.insert(field, value.clone());
    }

    if field_set == FieldSet::Extended {
        for field in OPTIONAL_FIELDS {
            let value = inputs
                .get(field)
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_default();
            state.insert(field, value);
        }
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(extra_inputs: &str) -> String {
        format!(
            r#"<html><body><form method="post" action="./ConsultaCFDHistorico.aspx">
            <input type="hidden" name="__VIEWSTATE" value="vs-token" />
            <input type="hidden" name="__EVENTVALIDATION" value="ev-token" />
            <input type="hidden" name="__VIEWSTATEGENERATOR" value="ABCD1234" />
            {extra_inputs}
            </form></body></html>"#
        )
    }

    #[test]
    fn test_extracts_required_trio() {
        let state = extract_session_state(&page(""), FieldSet::Strict).unwrap();
        assert_eq!(state.get("__VIEWSTATE"), Some("vs-token"));
        assert_eq!(state.get("__EVENTVALIDATION"), Some("ev-token"));
        assert_eq!(state.get("__VIEWSTATEGENERATOR"), Some("ABCD1234"));
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn test_strict_set_skips_optional_fields() {
        let html = page(r#"<input type="hidden" name="hfRfcRec" value="RINS6910023U7" />"#);
        let state = extract_session_state(&html, FieldSet::Strict).unwrap();
        assert!(!state.contains("hfRfcRec"));
    }

    #[test]
    fn test_extended_set_probes_optional_fields() {
        let html = page(r#"<input type="hidden" name="hfRfcRec" value="RINS6910023U7" />"#);
        let state = extract_session_state(&html, FieldSet::Extended).unwrap();
        assert_eq!(state.get("hfRfcRec"), Some("RINS6910023U7"));
    }

    #[test]
    fn test_absent_optional_fields_resolve_to_empty_string() {
        let state = extract_session_state(&page(""), FieldSet::Extended).unwrap();
        for field in OPTIONAL_FIELDS {
            assert_eq!(state.get(field), Some(""), "missing key: {field}");
        }
    }

    #[test]
    fn test_empty_optional_value_resolves_to_empty_string() {
        let html = page(r#"<input type="hidden" name="__VIEWSTATEENCRYPTED" value="" />"#);
        let state = extract_session_state(&html, FieldSet::Extended).unwrap();
        assert_eq!(state.get("__VIEWSTATEENCRYPTED"), Some(""));
    }

    #[test]
    fn test_missing_required_field_is_hard_failure() {
        let html = r#"<html><body><form>
            <input type="hidden" name="__EVENTVALIDATION" value="ev-token" />
            <input type="hidden" name="__VIEWSTATEGENERATOR" value="ABCD1234" />
            </form></body></html>"#;
        let err = extract_session_state(html, FieldSet::Extended).unwrap_err();
        match err {
            ScrapeError::MissingViewState { field } => assert_eq!(field, "__VIEWSTATE"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reextraction_of_unchanged_page_yields_same_state() {
        let html = page(r#"<input type="hidden" name="hfInvoca" value="1" />"#);
        let first = extract_session_state(&html, FieldSet::Extended).unwrap();
        let second = extract_session_state(&html, FieldSet::Extended).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.with_postback("gd", "Page$2"),
            second.with_postback("gd", "Page$2")
        );
    }
}
