//! End to end checks against servers on the loopback interface.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::ssl::{SslAcceptor, SslMethod, SslVersion};
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509NameBuilder, X509};

use ats_checker::ats::{self, Checker, SignatureAlgorithm};
use ats_checker::{AtsError, FetchOptions, Response, TlsVersion};

fn self_signed() -> (PKey<Private>, X509) {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, "localhost").unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(1).unwrap())
        .unwrap();
    let san = SubjectAlternativeName::new()
        .dns("localhost")
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(san).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    (key, builder.build())
}

fn respond<S: Read + Write>(stream: &mut S) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    let _ = stream.write_all(b"HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n");
    let _ = stream.flush();
}

/// Starts a one-shot TLS server and returns its port and certificate.
fn serve_tls(max_version: SslVersion, cipher_list: Option<&str>) -> (u16, X509) {
    let (key, cert) = self_signed();
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    acceptor.set_private_key(&key).unwrap();
    acceptor.set_certificate(&cert).unwrap();
    acceptor.set_max_proto_version(Some(max_version)).unwrap();
    if let Some(cipher_list) = cipher_list {
        acceptor.set_cipher_list(cipher_list).unwrap();
    }
    let acceptor = acceptor.build();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            if let Ok(mut tls) = acceptor.accept(stream) {
                respond(&mut tls);
                let _ = tls.shutdown();
            }
        }
    });
    (port, cert)
}

fn insecure() -> FetchOptions {
    FetchOptions {
        insecure: true,
        ..FetchOptions::default()
    }
}

#[test]
fn test_compliant_tls12_server() {
    let (port, _) = serve_tls(SslVersion::TLS1_2, Some("ECDHE-RSA-AES128-GCM-SHA256"));
    let url = format!("https://127.0.0.1:{}/health", port);

    let response = Response::fetch(&url, &insecure()).unwrap();
    assert_eq!(response.status, 204);

    let session = response.tls.as_ref().unwrap();
    assert_eq!(session.version, TlsVersion::Tls12);
    assert_eq!(session.cipher_suite, ats::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256);
    assert_eq!(
        session.leaf_signature_algorithm(),
        Some(&SignatureAlgorithm::Sha256WithRsa)
    );
    assert!(session.peer_certificates[0].subject.contains("CN=localhost"));

    assert!(ats::check(response.tls.as_ref()));
}

#[test]
fn test_tls13_server_is_not_acceptable() {
    let (port, _) = serve_tls(SslVersion::TLS1_3, None);
    let url = format!("https://127.0.0.1:{}/", port);

    let response = Response::fetch(&url, &insecure()).unwrap();
    let session = response.tls.as_ref().unwrap();
    assert_eq!(session.version, TlsVersion::Tls13);

    assert!(!Checker::strict().check(response.tls.as_ref()));
    assert!(!Checker::simple().check(response.tls.as_ref()));
}

#[test]
fn test_rsa_key_exchange_is_not_acceptable() {
    let (port, _) = serve_tls(SslVersion::TLS1_2, Some("AES128-SHA"));
    let url = format!("https://127.0.0.1:{}/", port);

    let response = Response::fetch(&url, &insecure()).unwrap();
    let session = response.tls.as_ref().unwrap();
    assert_eq!(session.version, TlsVersion::Tls12);
    assert_eq!(session.cipher_suite, ats::TLS_RSA_WITH_AES_128_CBC_SHA);

    assert!(!ats::check(response.tls.as_ref()));
}

#[test]
fn test_untrusted_certificate_is_a_transport_failure() {
    let (port, _) = serve_tls(SslVersion::TLS1_2, None);
    let url = format!("https://127.0.0.1:{}/", port);

    let err = Response::fetch(&url, &FetchOptions::default()).unwrap_err();
    assert!(matches!(err, AtsError::HandshakeFailed { .. }), "{:?}", err);
}

#[test]
fn test_ca_file_allows_verified_connection() {
    let (port, cert) = serve_tls(SslVersion::TLS1_2, Some("ECDHE-RSA-AES256-GCM-SHA384"));
    let mut ca_file = tempfile::NamedTempFile::new().unwrap();
    ca_file.write_all(&cert.to_pem().unwrap()).unwrap();

    let options = FetchOptions {
        ca_file: Some(ca_file.path().to_path_buf()),
        ..FetchOptions::default()
    };
    let url = format!("https://localhost:{}/", port);

    let response = Response::fetch(&url, &options).unwrap();
    assert_eq!(
        response.tls.as_ref().map(|s| s.cipher_suite),
        Some(ats::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384)
    );
    assert!(ats::check(response.tls.as_ref()));
}

#[test]
fn test_plain_http_has_no_tls() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            respond(&mut stream);
        }
    });

    let url = format!("http://127.0.0.1:{}/", port);
    let response = Response::fetch(&url, &FetchOptions::default()).unwrap();
    assert_eq!(response.status, 204);
    assert!(response.tls.is_none());
    assert!(!ats::check(response.tls.as_ref()));
}

#[test]
fn test_refused_connection_is_a_transport_failure() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = format!("https://127.0.0.1:{}/", port);

    let err = Response::fetch(&url, &insecure()).unwrap_err();
    assert!(matches!(err, AtsError::ConnectionFailed { .. }), "{:?}", err);
}
