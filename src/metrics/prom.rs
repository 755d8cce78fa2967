use lazy_static::lazy_static;
use prometheus::{labels, register_gauge, Gauge};
use tracing::debug;
use url::Url;

use ats_checker::report::Report;

lazy_static! {
    static ref ATS_CHECKER_ACCEPTABLE: Gauge = register_gauge!(
        "ats_checker_acceptable",
        "1 when the URL is acceptable for ATS, 0 otherwise"
    )
    .unwrap();
    static ref ATS_CHECKER_TLS_PRESENT: Gauge = register_gauge!(
        "ats_checker_tls_present",
        "1 when a TLS session was negotiated"
    )
    .unwrap();
}

/// Pushes the verdict of one report to the push gateway.
/// # Arguments
/// * `report` - Result of the check
/// * `prometheus_address` - Push gateway base address
pub fn prometheus_metrics(report: &Report, prometheus_address: &str) -> Result<(), prometheus::Error> {
    ATS_CHECKER_ACCEPTABLE.set(if report.acceptable { 1.0 } else { 0.0 });
    ATS_CHECKER_TLS_PRESENT.set(if report.compliance.tls_present { 1.0 } else { 0.0 });

    let host = Url::parse(&report.url)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
        .unwrap_or_default();
    let (protocol, cipher, signature) = match &report.tls {
        Some(tls) => (
            tls.version.to_string(),
            tls.cipher_name.to_owned(),
            tls.leaf_signature_algorithm()
                .map(|alg| alg.to_string())
                .unwrap_or_else(|| "none".to_string()),
        ),
        None => ("none".to_string(), "none".to_string(), "none".to_string()),
    };

    let metric_families = prometheus::gather();
    debug!("pushing {} metric families to {}", metric_families.len(), prometheus_address);
    prometheus::push_metrics(
        "ats_checker",
        labels! {
            "instance".to_owned() => "ats_checker".to_owned(),
            "host".to_owned() => host,
            "protocol".to_owned() => protocol,
            "cipher".to_owned() => cipher,
            "signature".to_owned() => signature,
        },
        &format!("{}/metrics/job", prometheus_address),
        metric_families,
        None,
    )
}
