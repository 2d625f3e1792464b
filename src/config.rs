use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::Client;
use std::env;
use std::time::Duration;

// ============================================================================
// PORTAL CONSTANTS
// ============================================================================

pub const DEFAULT_LISTING_URL: &str = "https://www.facturacioncfdigm.modelo.gmodelo.com.mx/ModeloFacturaPRD/Modulos/ClienteInternet/ConsultaCFDHistorico.aspx";
pub const DEFAULT_PDF_URL: &str = "https://www.facturacioncfdigm.modelo.gmodelo.com.mx/ModeloFacturaPRD/Modulos/ClienteInternet/VistaCFDpdf.aspx";
pub const DEFAULT_REFERER: &str =
    "https://www.facturacioncfdigm.modelo.gmodelo.com.mx/ModeloFacturaPRD/";
pub const DEFAULT_ISSUER_RFC: &str = "AMH080702RMA";
pub const DEFAULT_ISSUER_ID: &str = "9";
pub const DEFAULT_EXTERNO: &str = "0";

/// Endpoints and fixed issuer identifiers of the target portal. All values
/// can be overridden through the environment, which is how the test suite
/// points a run at a mock server.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub listing_url: String,
    pub pdf_url: String,
    pub referer: String,
    pub issuer_rfc: String,
    pub issuer_id: String,
    pub externo: String,
    /// The portal's TLS chain does not validate; the original client
    /// disabled verification for this host.
    pub accept_invalid_certs: bool,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            pdf_url: DEFAULT_PDF_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            issuer_rfc: DEFAULT_ISSUER_RFC.to_string(),
            issuer_id: DEFAULT_ISSUER_ID.to_string(),
            externo: DEFAULT_EXTERNO.to_string(),
            accept_invalid_certs: true,
        }
    }
}

impl PortalConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listing_url: env_or("CFDI_LISTING_URL", &defaults.listing_url),
            pdf_url: env_or("CFDI_PDF_URL", &defaults.pdf_url),
            referer: env_or("CFDI_REFERER", &defaults.referer),
            issuer_rfc: env_or("CFDI_ISSUER_RFC", &defaults.issuer_rfc),
            issuer_id: env_or("CFDI_ISSUER_ID", &defaults.issuer_id),
            externo: env_or("CFDI_EXTERNO", &defaults.externo),
            accept_invalid_certs: env::var("CFDI_ACCEPT_INVALID_CERTS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.accept_invalid_certs),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

// ============================================================================
// RETRY & PACING POLICY
// ============================================================================

/// Bounded-retry and cooldown parameters. The delays are policy, not
/// incidental: the portal throttles clients that hit it faster than a
/// browser session would.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay between retries of listing requests.
    pub listing_retry_delay: Duration,
    /// Delay between retries of document fetches; the PDF endpoint is the
    /// slower and touchier of the two.
    pub document_retry_delay: Duration,
    /// Cooldown before every listing POST.
    pub page_cooldown: Duration,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            listing_retry_delay: Duration::from_secs(2),
            document_retry_delay: Duration::from_secs(10),
            page_cooldown: Duration::from_millis(1500),
            request_timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// HTTP CLIENT
// ============================================================================

/// Builds the shared client for one run: cookie jar enabled (the server
/// session rides on it), browser-like headers, and the portal's TLS quirk
/// honored. The jar is owned by this one run and never shared.
pub fn build_client(portal: &PortalConfig, policy: &RetryPolicy) -> reqwest::Result<Client> {
    Client::builder()
        .cookie_store(true)
        .timeout(policy.request_timeout)
        .default_headers(default_headers(&portal.referer))
        .danger_accept_invalid_certs(portal.accept_invalid_certs)
        .build()
}

fn default_headers(referer: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
        ),
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert("DNT", HeaderValue::from_static("1"));
    if let Ok(value) = HeaderValue::from_str(referer) {
        headers.insert(REFERER, value);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portal_defaults_point_at_production() {
        let portal = PortalConfig::default();
        assert!(portal.listing_url.ends_with("ConsultaCFDHistorico.aspx"));
        assert!(portal.pdf_url.ends_with("VistaCFDpdf.aspx"));
        assert_eq!(portal.issuer_rfc, "AMH080702RMA");
        assert!(portal.accept_invalid_certs);
    }

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.listing_retry_delay, Duration::from_secs(2));
        assert_eq!(policy.document_retry_delay, Duration::from_secs(10));
        assert_eq!(policy.page_cooldown, Duration::from_millis(1500));
    }

    #[test]
    fn test_default_headers_include_referer() {
        let headers = default_headers(DEFAULT_REFERER);
        assert_eq!(
            headers.get(REFERER).and_then(|v| v.to_str().ok()),
            Some(DEFAULT_REFERER)
        );
        assert!(headers.contains_key(USER_AGENT));
    }
}
