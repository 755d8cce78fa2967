//! Strict versus simple checking.
//!
//! The simple checker ignores the certificate signature algorithm, so a
//! server with a SHA-1 signed leaf passes it but fails the strict one.
//!
//! Run with: cargo run --example simple_variant -- https://example.com

use ats_checker::ats::Checker;
use ats_checker::report::{OutputFormat, Report};
use ats_checker::{FetchOptions, Response};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://sha1-intermediate.badssl.com".to_string());

    let options = FetchOptions {
        insecure: true,
        ..FetchOptions::default()
    };
    let response = Response::fetch(&url, &options)?;

    for (label, checker) in [("strict", Checker::strict()), ("simple", Checker::simple())].iter() {
        let report = Report::new(response.clone(), checker);
        println!("--- {} ---", label);
        println!("{}", report.render(OutputFormat::Summary));
    }

    Ok(())
}
