use reqwest::Method;
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::scraping::error_handling::ScrapeError;
use crate::scraping::form_state::{extract_from_document, FieldSet};
use crate::scraping::http_client::HttpExecutor;
use crate::scraping::models::{PageOutcome, QueryContext, Record, SessionState, TargetPeriod};
use crate::scraping::postback::parse_postback_href;
use crate::scraping::row_parser::{classify_row, RowClass};

/// Element id of the results table on the listing page.
pub const RESULTS_TABLE_ID: &str = "gdHistorico";

pub const DEFAULT_PAGE_COOLDOWN: Duration = Duration::from_millis(1500);

/// How the pager anchor is located. The portal's own markup labels it
/// "Siguiente" (or "Next" in the English skin), which is what production
/// runs match on; `ById` pins a specific anchor id instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextLinkDiscovery {
    ByText,
    ById(String),
}

enum WalkState {
    AwaitingPage { session: SessionState, page: u32 },
    HaveRecords { continuation: Option<SessionState>, page: u32 },
    Done,
}

// ============================================================================
// PAGE PROCESSING
// ============================================================================

/// Processes one listing page body: scans the results table, classifies
/// rows against the target period, tracks the oldest date seen and decides
/// whether a next page is worth requesting.
///
/// The table is sorted descending by date, so once a row older than the
/// first day of the target month shows up, later pages can only be older
/// and the continuation is dropped regardless of any pager link.
pub fn process_listing_page(
    html: &str,
    target: &TargetPeriod,
    field_set: FieldSet,
    next_link: &NextLinkDiscovery,
) -> Result<PageOutcome, ScrapeError> {
    fn track_oldest(date: chrono::NaiveDate, oldest: &mut Option<chrono::NaiveDate>) {
        if oldest.map_or(true, |current| date < current) {
            *oldest = Some(date);
        }
    }

    let document = Html::parse_document(html);
    let row_selector = Selector::parse(&format!("table#{RESULTS_TABLE_ID} tr")).unwrap();
    let cell_selector = Selector::parse("td").unwrap();

    let mut records = Vec::new();
    let mut oldest_seen = None;

    // First row is the header.
    for row in document.select(&row_selector).skip(1) {
        let cells: Vec<String> = row
            .select(&cell_selector)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();
        match classify_row(&cells, target) {
            RowClass::InScope(record) => {
                track_oldest(record.date, &mut oldest_seen);
                records.push(record);
            }
            RowClass::OutOfScope(date) => track_oldest(date, &mut oldest_seen),
            RowClass::Unparsable => {}
        }
    }

    if oldest_seen.map_or(false, |oldest| oldest < target.first_day()) {
        return Ok(PageOutcome {
            records,
            oldest_seen,
            continuation: None,
        });
    }

    let continuation = match find_next_postback(&document, next_link) {
        Some((event_target, event_argument)) => {
            let state = extract_from_document(&document, field_set)?;
            Some(state.with_postback(&event_target, &event_argument))
        }
        None => None,
    };

    Ok(PageOutcome {
        records,
        oldest_seen,
        continuation,
    })
}

fn find_next_postback(
    document: &Html,
    next_link: &NextLinkDiscovery,
) -> Option<(String, String)> {
    let anchor = match next_link {
        NextLinkDiscovery::ByText => {
            let selector = Selector::parse("a").unwrap();
            document.select(&selector).find(|a| {
                let text = a.text().collect::<String>();
                let text = text.trim();
                text.contains("Siguiente") || text.contains("Next")
            })
        }
        NextLinkDiscovery::ById(id) => {
            let selector = Selector::parse(&format!("a#{id}")).ok()?;
            document.select(&selector).next()
        }
    }?;
    parse_postback_href(anchor.value().attr("href")?)
}

// ============================================================================
// PAGINATION WALKER
// ============================================================================

/// Drives the request/extract cycle across listing pages, accumulating the
/// in-range records until the stop condition hits or the pager runs out.
///
/// The walk is strictly sequential: the server keys its pagination cursor
/// to this one conversation, so there is never more than one request in
/// flight against the same session state.
pub struct PaginationWalker<'a> {
    executor: &'a HttpExecutor,
    listing_url: &'a str,
    target: TargetPeriod,
    field_set: FieldSet,
    next_link: NextLinkDiscovery,
    page_cooldown: Duration,
}

impl<'a> PaginationWalker<'a> {
    pub fn new(executor: &'a HttpExecutor, listing_url: &'a str, target: TargetPeriod) -> Self {
        Self {
            executor,
            listing_url,
            target,
            field_set: FieldSet::Extended,
            next_link: NextLinkDiscovery::ByText,
            page_cooldown: DEFAULT_PAGE_COOLDOWN,
        }
    }

    pub fn with_field_set(mut self, field_set: FieldSet) -> Self {
        self.field_set = field_set;
        self
    }

    pub fn with_next_link(mut self, next_link: NextLinkDiscovery) -> Self {
        self.next_link = next_link;
        self
    }

    pub fn with_page_cooldown(mut self, page_cooldown: Duration) -> Self {
        self.page_cooldown = page_cooldown;
        self
    }

    /// Walks the listing starting from the bootstrapped session state and
    /// returns every record dated in the target period.
    ///
    /// A page whose request exhausts its retries ends the walk but keeps
    /// whatever was already collected; a page missing a required hidden
    /// field aborts with an error since replaying from it would desync the
    /// server-side state.
    pub async fn walk(
        &self,
        query: &QueryContext,
        initial: SessionState,
    ) -> Result<Vec<Record>, ScrapeError> {
        let mut collected: Vec<Record> = Vec::new();
        let mut state = WalkState::AwaitingPage {
            session: initial,
            page: 1,
        };

        loop {
            state = match state {
                WalkState::AwaitingPage { session, page } => {
                    info!("Processing page {}...", page);
                    sleep(self.page_cooldown).await;

                    let form = listing_form(query, &session);
                    match self
                        .executor
                        .execute(Method::POST, self.listing_url, &[], Some(&form))
                        .await
                    {
                        Ok(response) => match response.text().await {
                            Ok(body) => {
                                let outcome = process_listing_page(
                                    &body,
                                    &self.target,
                                    self.field_set,
                                    &self.next_link,
                                )?;
                                debug!(
                                    "Page {}: {} in-scope records, oldest date seen {:?}",
                                    page,
                                    outcome.records.len(),
                                    outcome.oldest_seen
                                );
                                collected.extend(outcome.records);
                                WalkState::HaveRecords {
                                    continuation: outcome.continuation,
                                    page,
                                }
                            }
                            Err(err) => {
                                warn!("Page {} body could not be read: {}", page, err);
                                WalkState::HaveRecords {
                                    continuation: None,
                                    page,
                                }
                            }
                        },
                        Err(err) => {
                            warn!(
                                "Page {} failed, keeping {} records collected so far: {}",
                                page,
                                collected.len(),
                                err
                            );
                            WalkState::HaveRecords {
                                continuation: None,
                                page,
                            }
                        }
                    }
                }
                WalkState::HaveRecords { continuation, page } => match continuation {
                    Some(session) => WalkState::AwaitingPage {
                        session,
                        page: page + 1,
                    },
                    None => WalkState::Done,
                },
                WalkState::Done => break,
            };
        }

        Ok(collected)
    }
}

fn listing_form(query: &QueryContext, session: &SessionState) -> Vec<(String, String)> {
    let mut form = query.form_fields();
    form.extend(
        session
            .form_fields()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    );
    form
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(date: &str, itu: &str) -> String {
        format!(
            "<tr><td>FACTURA</td><td>A-1</td><td>Tienda</td><td>{date}</td>\
             <td>100.00</td><td>Vigente</td><td>{itu}</td></tr>"
        )
    }

    fn listing_page(rows: &[String], next_href: Option<&str>) -> String {
        let pager = next_href
            .map(|href| format!(r##"<a id="lnkSiguiente" href="{href}">Siguiente &gt;</a>"##))
            .unwrap_or_default();
        format!(
            r#"<html><body><form method="post">
            <input type="hidden" name="__VIEWSTATE" value="vs" />
            <input type="hidden" name="__EVENTVALIDATION" value="ev" />
            <input type="hidden" name="__VIEWSTATEGENERATOR" value="gen" />
            <table id="gdHistorico">
            <tr><th>Tipo</th><th>Folio</th><th>Sucursal</th><th>Fecha</th>
            <th>Importe</th><th>Estado</th><th>ITU</th></tr>
            {}
            </table>
            {pager}
            </form></body></html>"#,
            rows.join("\n")
        )
    }

    fn target() -> TargetPeriod {
        TargetPeriod::new(3, 2025).unwrap()
    }

    const NEXT_HREF: &str = "javascript:__doPostBack('gdHistorico','Page$2')";

    #[test]
    fn test_in_scope_rows_collected_and_stop_on_older_date() {
        // Rows 15/03, 02/03 and 20/02 against a March 2025 target.
        let html = listing_page(
            &[
                row("15/03/2025", "A"),
                row("02/03/2025", "B"),
                row("20/02/2025", "C"),
            ],
            Some(NEXT_HREF),
        );
        let outcome =
            process_listing_page(&html, &target(), FieldSet::Extended, &NextLinkDiscovery::ByText)
                .unwrap();

        let itus: Vec<&str> = outcome.records.iter().map(|r| r.itu.as_str()).collect();
        assert_eq!(itus, vec!["A", "B"]);
        assert_eq!(outcome.oldest_seen, NaiveDate::from_ymd_opt(2025, 2, 20));
        // Pagination halts even though a next link exists.
        assert!(outcome.continuation.is_none());
    }

    #[test]
    fn test_continuation_carries_state_and_postback_pair() {
        let html = listing_page(&[row("15/03/2025", "A")], Some(NEXT_HREF));
        let outcome =
            process_listing_page(&html, &target(), FieldSet::Extended, &NextLinkDiscovery::ByText)
                .unwrap();

        let continuation = outcome.continuation.expect("expected a next page");
        assert_eq!(continuation.get("__EVENTTARGET"), Some("gdHistorico"));
        assert_eq!(continuation.get("__EVENTARGUMENT"), Some("Page$2"));
        assert_eq!(continuation.get("__VIEWSTATE"), Some("vs"));
        assert_eq!(continuation.get("__EVENTVALIDATION"), Some("ev"));
    }

    #[test]
    fn test_no_next_link_ends_walk() {
        let html = listing_page(&[row("15/03/2025", "A")], None);
        let outcome =
            process_listing_page(&html, &target(), FieldSet::Extended, &NextLinkDiscovery::ByText)
                .unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert!(outcome.continuation.is_none());
    }

    #[test]
    fn test_next_link_without_postback_grammar_ends_walk() {
        let html = listing_page(&[row("15/03/2025", "A")], Some("ConsultaCFDHistorico.aspx?p=2"));
        let outcome =
            process_listing_page(&html, &target(), FieldSet::Extended, &NextLinkDiscovery::ByText)
                .unwrap();
        assert!(outcome.continuation.is_none());
    }

    #[test]
    fn test_zero_in_scope_records_does_not_stop_pagination() {
        // Rows newer than the target month: keep walking toward it.
        let html = listing_page(&[row("10/04/2025", "X")], Some(NEXT_HREF));
        let outcome =
            process_listing_page(&html, &target(), FieldSet::Extended, &NextLinkDiscovery::ByText)
                .unwrap();
        assert!(outcome.records.is_empty());
        assert!(outcome.continuation.is_some());
    }

    #[test]
    fn test_unparsable_rows_do_not_affect_oldest_tracking() {
        let html = listing_page(
            &[
                row("garbled", "X"),
                row("15/03/2025", "A"),
                "<tr><td>corto</td></tr>".to_string(),
            ],
            Some(NEXT_HREF),
        );
        let outcome =
            process_listing_page(&html, &target(), FieldSet::Extended, &NextLinkDiscovery::ByText)
                .unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.oldest_seen, NaiveDate::from_ymd_opt(2025, 3, 15));
        assert!(outcome.continuation.is_some());
    }

    #[test]
    fn test_missing_results_table_yields_zero_records() {
        let html = r#"<html><body><form>
            <input type="hidden" name="__VIEWSTATE" value="vs" />
            <input type="hidden" name="__EVENTVALIDATION" value="ev" />
            <input type="hidden" name="__VIEWSTATEGENERATOR" value="gen" />
            </form></body></html>"#;
        let outcome =
            process_listing_page(html, &target(), FieldSet::Extended, &NextLinkDiscovery::ByText)
                .unwrap();
        assert!(outcome.records.is_empty());
        assert!(outcome.oldest_seen.is_none());
        assert!(outcome.continuation.is_none());
    }

    #[test]
    fn test_missing_viewstate_with_next_link_is_hard_failure() {
        let html = format!(
            r##"<html><body><form>
            <input type="hidden" name="__EVENTVALIDATION" value="ev" />
            <input type="hidden" name="__VIEWSTATEGENERATOR" value="gen" />
            <table id="gdHistorico">
            <tr><th>h</th></tr>
            {}
            </table>
            <a href="{NEXT_HREF}">Siguiente</a>
            </form></body></html>"##,
            row("15/03/2025", "A")
        );
        let err = process_listing_page(
            &html,
            &target(),
            FieldSet::Extended,
            &NextLinkDiscovery::ByText,
        )
        .unwrap_err();
        assert!(matches!(err, ScrapeError::MissingViewState { .. }));
    }

    #[test]
    fn test_next_link_discovery_by_element_id() {
        let html = listing_page(&[row("15/03/2025", "A")], Some(NEXT_HREF));
        let by_id = NextLinkDiscovery::ById("lnkSiguiente".to_string());
        let outcome = process_listing_page(&html, &target(), FieldSet::Extended, &by_id).unwrap();
        assert!(outcome.continuation.is_some());

        let wrong_id = NextLinkDiscovery::ById("lnkOtro".to_string());
        let outcome =
            process_listing_page(&html, &target(), FieldSet::Extended, &wrong_id).unwrap();
        assert!(outcome.continuation.is_none());
    }

    #[test]
    fn test_oldest_tracking_is_monotonic_across_rows() {
        let html = listing_page(
            &[
                row("15/03/2025", "A"),
                row("02/03/2025", "B"),
                row("10/03/2025", "C"),
            ],
            None,
        );
        let outcome =
            process_listing_page(&html, &target(), FieldSet::Extended, &NextLinkDiscovery::ByText)
                .unwrap();
        assert_eq!(outcome.oldest_seen, NaiveDate::from_ymd_opt(2025, 3, 2));
    }

    #[test]
    fn test_listing_form_combines_query_context_and_session() {
        let ctx = QueryContext {
            rfc_rec: "RINS6910023U7".to_string(),
            rfc_emi: "AMH080702RMA".to_string(),
            id_emi: "9".to_string(),
            externo: "0".to_string(),
        };
        let mut session = SessionState::new();
        session.insert("__VIEWSTATE", "vs");

        let form = listing_form(&ctx, &session);
        assert!(form.contains(&("rfcRec".to_string(), "RINS6910023U7".to_string())));
        assert!(form.contains(&("__VIEWSTATE".to_string(), "vs".to_string())));
    }
}
