//! ATS Checker - App Transport Security compliance for HTTPS endpoints
//!
//! Fetches a URL once and classifies the negotiated TLS parameters (protocol
//! version, cipher suite, leaf certificate signature algorithm) against
//! Apple's App Transport Security allow-lists.
//!
//! # Example
//!
//! ```no_run
//! use ats_checker::{ats::Checker, FetchOptions, Response};
//!
//! let response = Response::fetch("https://example.com", &FetchOptions::default())?;
//! if Checker::strict().check(response.tls.as_ref()) {
//!     println!("{} is acceptable for ATS", response.url);
//! }
//! # Ok::<(), ats_checker::AtsError>(())
//! ```

pub mod ats;
pub mod config;
pub mod error;
pub mod report;

pub use error::AtsError;

use openssl::ssl::{SslConnector, SslMethod, SslRef, SslVerifyMode, SslVersion};
use openssl::x509::X509Ref;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;
use strum_macros::Display;
use tracing::{debug, warn};
use url::Url;

use crate::ats::SignatureAlgorithm;

static TIMEOUT: u64 = 30;

/// Upper bound on the response head read back after the request.
const MAX_HEAD_SIZE: usize = 64 * 1024;
const MAX_HEADERS: usize = 64;

/// Negotiated TLS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum TlsVersion {
    #[strum(serialize = "SSLv3")]
    Ssl3,
    #[strum(serialize = "TLSv1")]
    Tls10,
    #[strum(serialize = "TLSv1.1")]
    Tls11,
    #[strum(serialize = "TLSv1.2")]
    Tls12,
    #[strum(serialize = "TLSv1.3")]
    Tls13,
    #[strum(serialize = "unknown")]
    Unknown,
}

impl TlsVersion {
    fn from_ssl(version: Option<SslVersion>) -> Self {
        match version {
            Some(v) if v == SslVersion::SSL3 => TlsVersion::Ssl3,
            Some(v) if v == SslVersion::TLS1 => TlsVersion::Tls10,
            Some(v) if v == SslVersion::TLS1_1 => TlsVersion::Tls11,
            Some(v) if v == SslVersion::TLS1_2 => TlsVersion::Tls12,
            Some(v) if v == SslVersion::TLS1_3 => TlsVersion::Tls13,
            _ => TlsVersion::Unknown,
        }
    }
}

/// A certificate presented by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerCertificate {
    pub subject: String,
    pub signature_algorithm: SignatureAlgorithm,
}

impl PeerCertificate {
    fn from_x509(cert: &X509Ref) -> Self {
        let subject = cert
            .subject_name()
            .entries()
            .filter_map(|entry| {
                let key = entry.object().nid().short_name().ok()?;
                Some(format!("{}={}", key, entry.data().to_string().ok()?))
            })
            .collect::<Vec<String>>()
            .join(", ");
        let algorithm = cert.signature_algorithm().object();
        PeerCertificate {
            subject,
            signature_algorithm: SignatureAlgorithm::from_nid(algorithm.nid(), &algorithm.to_string()),
        }
    }
}

/// Security parameters negotiated by a completed TLS handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSession {
    pub version: TlsVersion,
    /// IANA cipher suite identifier
    pub cipher_suite: u16,
    pub cipher_name: String,
    /// Certificates as presented by the server, leaf first
    pub peer_certificates: Vec<PeerCertificate>,
}

impl TlsSession {
    fn from_ssl(ssl: &SslRef) -> Result<TlsSession, AtsError> {
        let cipher = ssl.current_cipher().ok_or_else(|| AtsError::HandshakeFailed {
            details: "no cipher negotiated".to_string(),
        })?;
        let cipher_suite = u16::from_be_bytes(cipher.protocol_id());
        let cipher_name = cipher.standard_name().unwrap_or_else(|| cipher.name()).to_string();

        let peer_certificates = match ssl.peer_cert_chain() {
            Some(chain) => chain.iter().map(PeerCertificate::from_x509).collect(),
            None => ssl
                .peer_certificate()
                .map(|leaf| vec![PeerCertificate::from_x509(&leaf)])
                .unwrap_or_default(),
        };

        Ok(TlsSession {
            version: TlsVersion::from_ssl(ssl.version2()),
            cipher_suite,
            cipher_name,
            peer_certificates,
        })
    }

    /// Signature algorithm of the first certificate in the presented chain.
    pub fn leaf_signature_algorithm(&self) -> Option<&SignatureAlgorithm> {
        self.peer_certificates.first().map(|cert| &cert.signature_algorithm)
    }
}

/// How the single request is made.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Skip certificate and hostname verification
    pub insecure: bool,
    /// Connect, read and write timeout
    pub timeout: Duration,
    /// Extra CA bundle used to verify the server
    pub ca_file: Option<PathBuf>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            insecure: false,
            timeout: Duration::from_secs(TIMEOUT),
            ca_file: None,
        }
    }
}

/// Result of one GET request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub url: String,
    pub status: u16,
    /// `None` when the request went over plain HTTP
    pub tls: Option<TlsSession>,
}

impl Response {
    /// Performs a single GET on `url` and records the TLS session, if any.
    ///
    /// `https` URLs go through an OpenSSL client handshake; `http` URLs are
    /// fetched in the clear and come back with `tls` set to `None`.
    ///
    /// # Errors
    ///
    /// Any DNS, TCP, TLS or HTTP framing failure. A handshake that
    /// negotiates weak parameters is not an error.
    pub fn fetch(url: &str, options: &FetchOptions) -> Result<Response, AtsError> {
        let parsed = Url::parse(url)?;
        let host = parsed
            .host_str()
            .ok_or_else(|| AtsError::InvalidInput {
                field: "url".to_string(),
                reason: "missing host".to_string(),
            })?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = parsed.port_or_known_default().ok_or_else(|| AtsError::InvalidInput {
            field: "url".to_string(),
            reason: format!("no default port for scheme '{}'", parsed.scheme()),
        })?;

        let use_tls = match parsed.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(AtsError::InvalidInput {
                    field: "url".to_string(),
                    reason: format!("unsupported scheme '{}'", other),
                })
            }
        };

        let tcp_stream = connect(&host, port, options.timeout)?;
        let request = build_request(&parsed);

        if !use_tls {
            warn!("{} is plain HTTP, no TLS will be negotiated", url);
            let mut stream = tcp_stream;
            let status = exchange(&mut stream, &request)?;
            return Ok(Response {
                url: url.to_string(),
                status,
                tls: None,
            });
        }

        let connector = build_connector(options)?;
        let mut config = connector.configure()?;
        config.set_verify_hostname(!options.insecure);
        let mut stream = config.connect(&host, tcp_stream)?;

        let session = TlsSession::from_ssl(stream.ssl())?;
        debug!(
            "handshake with {} done: {} {} ({} certificates)",
            host,
            session.version,
            session.cipher_name,
            session.peer_certificates.len()
        );

        let status = exchange(&mut stream, &request)?;
        Ok(Response {
            url: url.to_string(),
            status,
            tls: Some(session),
        })
    }
}

fn build_connector(options: &FetchOptions) -> Result<SslConnector, AtsError> {
    let mut builder = SslConnector::builder(SslMethod::tls())?;
    if let Some(ca_file) = &options.ca_file {
        builder.set_ca_file(ca_file)?;
    }
    if options.insecure {
        builder.set_verify(SslVerifyMode::NONE);
    }
    Ok(builder.build())
}

fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, AtsError> {
    let addresses: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| AtsError::DnsResolution {
            hostname: host.to_string(),
            source: e,
        })?
        .collect();

    let mut last_error = None;
    for address in addresses {
        debug!("connecting to {}", address);
        match TcpStream::connect_timeout(&address, timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                return Ok(stream);
            }
            Err(e) => {
                debug!("connection to {} failed: {}", address, e);
                last_error = Some(e);
            }
        }
    }

    let address = format!("{}:{}", host, port);
    match last_error {
        Some(e) if e.kind() == std::io::ErrorKind::TimedOut => Err(AtsError::Timeout {
            operation: format!("connect to {}", address),
        }),
        Some(e) => Err(AtsError::ConnectionFailed { address, source: e }),
        None => Err(AtsError::DnsResolution {
            hostname: host.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"),
        }),
    }
}

fn build_request(url: &Url) -> String {
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    let host = match url.port() {
        Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
        None => url.host_str().unwrap_or_default().to_string(),
    };
    format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: ats-checker/{}\r\nAccept: */*\r\nConnection: close\r\n\r\n",
        target,
        host,
        env!("CARGO_PKG_VERSION")
    )
}

/// Sends the request and returns the status code of the response head.
fn exchange<S: Read + Write>(stream: &mut S, request: &str) -> Result<u16, AtsError> {
    stream.write_all(request.as_bytes())?;
    stream.flush()?;

    let mut head = Vec::with_capacity(4096);
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
        if parse_status(&head)?.is_some() {
            break;
        }
        if head.len() > MAX_HEAD_SIZE {
            return Err(AtsError::InvalidResponse {
                reason: format!("response head larger than {} bytes", MAX_HEAD_SIZE),
            });
        }
    }

    parse_status(&head)?.ok_or_else(|| AtsError::InvalidResponse {
        reason: "connection closed before the response head was complete".to_string(),
    })
}

fn parse_status(head: &[u8]) -> Result<Option<u16>, AtsError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut headers);
    match response.parse(head) {
        Ok(httparse::Status::Complete(_)) => Ok(response.code),
        Ok(httparse::Status::Partial) => Ok(None),
        Err(e) => Err(AtsError::InvalidResponse {
            reason: e.to_string(),
        }),
    }
}
