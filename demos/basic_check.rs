//! Basic ATS check example.
//!
//! Fetches one URL and prints every rule of the strict ATS check.
//!
//! Run with: cargo run --example basic_check -- https://example.com

use ats_checker::ats::Checker;
use ats_checker::{FetchOptions, Response};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://www.apple.com".to_string());

    println!("=== ATS Check: {} ===\n", url);

    let response = Response::fetch(&url, &FetchOptions::default())?;
    println!("HTTP status: {}", response.status);

    match &response.tls {
        Some(session) => {
            println!("Protocol Version: {}", session.version);
            println!("Cipher Suite: {} (0x{:04x})", session.cipher_name, session.cipher_suite);
            println!("Certificate chain:");
            for cert in &session.peer_certificates {
                println!("  - {} [{}]", cert.subject, cert.signature_algorithm);
            }
        }
        None => println!("No TLS session"),
    }
    println!();

    let compliance = Checker::strict().evaluate(response.tls.as_ref());
    println!("Protocol is TLS 1.2: {}", compliance.protocol_ok);
    println!("Cipher acceptable: {}", compliance.cipher_ok);
    println!("Signature acceptable: {:?}", compliance.signature_ok);
    println!("Acceptable for ATS: {}", compliance.is_acceptable());

    Ok(())
}
