//! Rendering of a check result.

use comfy_table::{Cell, Table};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::ats::{Checker, Compliance};
use crate::{Response, TlsSession};

/// How the verdict is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    Text,
    Json,
    Summary,
}

/// Verdict for one URL together with what was observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub url: String,
    pub status: u16,
    pub acceptable: bool,
    pub compliance: Compliance,
    pub tls: Option<TlsSession>,
}

impl Report {
    pub fn new(response: Response, checker: &Checker) -> Self {
        let compliance = checker.evaluate(response.tls.as_ref());
        Report {
            url: response.url,
            status: response.status,
            acceptable: compliance.is_acceptable(),
            compliance,
            tls: response.tls,
        }
    }

    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Text => self.render_text(),
            OutputFormat::Json => serde_json::to_string_pretty(self)
                .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)),
            OutputFormat::Summary => self.render_summary(),
        }
    }

    fn render_text(&self) -> String {
        if self.acceptable {
            format!("{} is acceptable for ATS", self.url)
        } else {
            format!(
                "{} is not acceptable for ATS\n debug info: {:#?}",
                self.url, self.tls
            )
        }
    }

    fn render_summary(&self) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Check", "Observed", "Result"]);

        let session = self.tls.as_ref();
        table.add_row(vec![
            Cell::new("TLS"),
            Cell::new(if session.is_some() { "present" } else { "absent" }),
            Cell::new(verdict(Some(self.compliance.tls_present))),
        ]);
        table.add_row(vec![
            Cell::new("Protocol"),
            Cell::new(session.map(|s| s.version.to_string()).unwrap_or_else(|| "-".to_string())),
            Cell::new(verdict(Some(self.compliance.protocol_ok))),
        ]);
        table.add_row(vec![
            Cell::new("Cipher suite"),
            Cell::new(
                session
                    .map(|s| format!("{} (0x{:04x})", s.cipher_name, s.cipher_suite))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(verdict(Some(self.compliance.cipher_ok))),
        ]);
        table.add_row(vec![
            Cell::new("Signature algorithm"),
            Cell::new(
                session
                    .and_then(|s| s.leaf_signature_algorithm())
                    .map(|alg| alg.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(verdict(self.compliance.signature_ok)),
        ]);

        format!(
            "{}\n{}\n{}",
            self.url,
            table,
            if self.acceptable {
                "ATS: ACCEPTABLE"
            } else {
                "ATS: NOT ACCEPTABLE"
            }
        )
    }
}

fn verdict(result: Option<bool>) -> &'static str {
    match result {
        Some(true) => "OK",
        Some(false) => "FAIL",
        None => "skipped",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ats::{SignatureAlgorithm, TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256};
    use crate::{PeerCertificate, TlsVersion};
    use std::str::FromStr;

    fn response(tls: Option<TlsSession>) -> Response {
        Response {
            url: "https://example.com".to_string(),
            status: 200,
            tls,
        }
    }

    fn session(version: TlsVersion) -> TlsSession {
        TlsSession {
            version,
            cipher_suite: TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            cipher_name: "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256".to_string(),
            peer_certificates: vec![PeerCertificate {
                subject: "CN=example.com".to_string(),
                signature_algorithm: SignatureAlgorithm::Sha256WithRsa,
            }],
        }
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::from_str("json").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("SUMMARY").unwrap(), OutputFormat::Summary);
        assert_eq!(OutputFormat::Text.to_string(), "text");
        assert!(OutputFormat::from_str("xml").is_err());
    }

    #[test]
    fn test_text_acceptable() {
        let report = Report::new(response(Some(session(TlsVersion::Tls12))), &Checker::strict());
        assert!(report.acceptable);
        assert_eq!(
            report.render(OutputFormat::Text),
            "https://example.com is acceptable for ATS"
        );
    }

    #[test]
    fn test_text_not_acceptable_dumps_session() {
        let report = Report::new(response(Some(session(TlsVersion::Tls13))), &Checker::strict());
        assert!(!report.acceptable);
        let text = report.render(OutputFormat::Text);
        assert!(text.starts_with("https://example.com is not acceptable for ATS\n debug info:"));
        assert!(text.contains("Tls13"));
    }

    #[test]
    fn test_text_without_tls() {
        let report = Report::new(response(None), &Checker::strict());
        assert!(!report.acceptable);
        assert!(report.render(OutputFormat::Text).contains("debug info: None"));
    }

    #[test]
    fn test_json_output() {
        let report = Report::new(response(Some(session(TlsVersion::Tls12))), &Checker::simple());
        let value: serde_json::Value =
            serde_json::from_str(&report.render(OutputFormat::Json)).unwrap();
        assert_eq!(value["acceptable"], true);
        assert_eq!(value["compliance"]["signature_ok"], serde_json::Value::Null);
        assert_eq!(value["tls"]["cipher_suite"], 0xc02f);
    }

    #[test]
    fn test_summary_output() {
        let report = Report::new(response(Some(session(TlsVersion::Tls12))), &Checker::simple());
        let summary = report.render(OutputFormat::Summary);
        assert!(summary.contains("TLSv1.2"));
        assert!(summary.contains("SHA256-RSA"));
        assert!(summary.contains("skipped"));
        assert!(summary.ends_with("ATS: ACCEPTABLE"));
    }
}
