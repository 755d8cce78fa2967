//! App Transport Security compliance rules.
//!
//! ATS accepts a connection only when it negotiates TLS 1.2 with one of a
//! fixed set of forward-secret AES cipher suites, and (in the strict form)
//! when the leaf certificate is signed with SHA-2 and RSA or ECDSA.
//!
//! See <https://developer.apple.com/library/prerelease/ios/technotes/App-Transport-Security-Technote/>

use std::fmt;

use openssl::nid::Nid;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{TlsSession, TlsVersion};

pub const TLS_RSA_WITH_AES_128_CBC_SHA: u16 = 0x002f;
pub const TLS_RSA_WITH_AES_256_CBC_SHA: u16 = 0x0035;
pub const TLS_RSA_WITH_AES_128_GCM_SHA256: u16 = 0x009c;
pub const TLS_RSA_WITH_AES_256_GCM_SHA384: u16 = 0x009d;
pub const TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA: u16 = 0xc009;
pub const TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA: u16 = 0xc00a;
pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA: u16 = 0xc013;
pub const TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA: u16 = 0xc014;
pub const TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256: u16 = 0xc023;
pub const TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384: u16 = 0xc024;
pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256: u16 = 0xc027;
pub const TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384: u16 = 0xc028;
pub const TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256: u16 = 0xc02b;
pub const TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384: u16 = 0xc02c;
pub const TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256: u16 = 0xc02f;
pub const TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384: u16 = 0xc030;
pub const TLS_AES_128_GCM_SHA256: u16 = 0x1301;
pub const TLS_AES_256_GCM_SHA384: u16 = 0x1302;
pub const TLS_CHACHA20_POLY1305_SHA256: u16 = 0x1303;

/// Cipher suites ATS accepts.
pub static ACCEPTABLE_CIPHER_SUITES: [u16; 11] = [
    TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384,
    TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA,
    TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256,
    TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
    TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
    TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384,
    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256,
    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
];

/// Certificate signature algorithms ATS accepts.
pub static ACCEPTABLE_SIGNATURE_ALGORITHMS: [SignatureAlgorithm; 6] = [
    SignatureAlgorithm::Sha256WithRsa,
    SignatureAlgorithm::Sha384WithRsa,
    SignatureAlgorithm::Sha512WithRsa,
    SignatureAlgorithm::EcdsaWithSha256,
    SignatureAlgorithm::EcdsaWithSha384,
    SignatureAlgorithm::EcdsaWithSha512,
];

static CIPHER_SUITE_NAMES: [(u16, &str); 19] = [
    (TLS_RSA_WITH_AES_128_CBC_SHA, "TLS_RSA_WITH_AES_128_CBC_SHA"),
    (TLS_RSA_WITH_AES_256_CBC_SHA, "TLS_RSA_WITH_AES_256_CBC_SHA"),
    (TLS_RSA_WITH_AES_128_GCM_SHA256, "TLS_RSA_WITH_AES_128_GCM_SHA256"),
    (TLS_RSA_WITH_AES_256_GCM_SHA384, "TLS_RSA_WITH_AES_256_GCM_SHA384"),
    (TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA, "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA"),
    (TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA, "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA"),
    (TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA, "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA"),
    (TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA, "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA"),
    (TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256, "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256"),
    (TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384, "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384"),
    (TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256, "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256"),
    (TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384, "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384"),
    (TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256, "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256"),
    (TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384, "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384"),
    (TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256, "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256"),
    (TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384, "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384"),
    (TLS_AES_128_GCM_SHA256, "TLS_AES_128_GCM_SHA256"),
    (TLS_AES_256_GCM_SHA384, "TLS_AES_256_GCM_SHA384"),
    (TLS_CHACHA20_POLY1305_SHA256, "TLS_CHACHA20_POLY1305_SHA256"),
];

/// Returns the IANA registry name of a cipher suite, if known.
pub fn cipher_suite_name(id: u16) -> Option<&'static str> {
    CIPHER_SUITE_NAMES
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, name)| *name)
}

/// Algorithm used to sign an X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    Md2WithRsa,
    Md5WithRsa,
    Sha1WithRsa,
    Sha256WithRsa,
    Sha384WithRsa,
    Sha512WithRsa,
    DsaWithSha1,
    DsaWithSha256,
    EcdsaWithSha1,
    EcdsaWithSha256,
    EcdsaWithSha384,
    EcdsaWithSha512,
    /// Anything else, carrying the algorithm's object identifier text.
    Unknown(String),
}

impl SignatureAlgorithm {
    /// Maps an OpenSSL signature algorithm NID.
    ///
    /// `object` is the textual OID used when the NID is not one of the
    /// algorithms listed above.
    pub fn from_nid(nid: Nid, object: &str) -> Self {
        let known = [
            (Nid::MD2WITHRSAENCRYPTION, SignatureAlgorithm::Md2WithRsa),
            (Nid::MD5WITHRSAENCRYPTION, SignatureAlgorithm::Md5WithRsa),
            (Nid::SHA1WITHRSAENCRYPTION, SignatureAlgorithm::Sha1WithRsa),
            (Nid::SHA256WITHRSAENCRYPTION, SignatureAlgorithm::Sha256WithRsa),
            (Nid::SHA384WITHRSAENCRYPTION, SignatureAlgorithm::Sha384WithRsa),
            (Nid::SHA512WITHRSAENCRYPTION, SignatureAlgorithm::Sha512WithRsa),
            (Nid::DSAWITHSHA1, SignatureAlgorithm::DsaWithSha1),
            (Nid::DSA_WITH_SHA256, SignatureAlgorithm::DsaWithSha256),
            (Nid::ECDSA_WITH_SHA1, SignatureAlgorithm::EcdsaWithSha1),
            (Nid::ECDSA_WITH_SHA256, SignatureAlgorithm::EcdsaWithSha256),
            (Nid::ECDSA_WITH_SHA384, SignatureAlgorithm::EcdsaWithSha384),
            (Nid::ECDSA_WITH_SHA512, SignatureAlgorithm::EcdsaWithSha512),
        ];
        known
            .iter()
            .find(|(candidate, _)| *candidate == nid)
            .map(|(_, alg)| alg.clone())
            .unwrap_or_else(|| SignatureAlgorithm::Unknown(object.to_string()))
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Md2WithRsa => "MD2-RSA",
            Self::Md5WithRsa => "MD5-RSA",
            Self::Sha1WithRsa => "SHA1-RSA",
            Self::Sha256WithRsa => "SHA256-RSA",
            Self::Sha384WithRsa => "SHA384-RSA",
            Self::Sha512WithRsa => "SHA512-RSA",
            Self::DsaWithSha1 => "DSA-SHA1",
            Self::DsaWithSha256 => "DSA-SHA256",
            Self::EcdsaWithSha1 => "ECDSA-SHA1",
            Self::EcdsaWithSha256 => "ECDSA-SHA256",
            Self::EcdsaWithSha384 => "ECDSA-SHA384",
            Self::EcdsaWithSha512 => "ECDSA-SHA512",
            Self::Unknown(oid) => return write!(f, "unknown ({})", oid),
        };
        f.write_str(name)
    }
}

/// Outcome of each individual rule for one handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compliance {
    /// A TLS session was negotiated at all
    pub tls_present: bool,
    /// The negotiated protocol is exactly TLS 1.2
    pub protocol_ok: bool,
    /// The negotiated cipher suite is in the allow-list
    pub cipher_ok: bool,
    /// The leaf signature algorithm is in the allow-list, `None` when not checked
    pub signature_ok: Option<bool>,
}

impl Compliance {
    pub fn is_acceptable(&self) -> bool {
        self.tls_present && self.protocol_ok && self.cipher_ok && self.signature_ok.unwrap_or(true)
    }
}

/// Classifies handshakes against the ATS allow-lists.
///
/// The strict checker also requires an acceptable leaf certificate
/// signature; the simple one only looks at protocol and cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checker {
    pub check_signature: bool,
}

impl Default for Checker {
    fn default() -> Self {
        Checker::strict()
    }
}

impl Checker {
    pub fn strict() -> Self {
        Checker {
            check_signature: true,
        }
    }

    pub fn simple() -> Self {
        Checker {
            check_signature: false,
        }
    }

    /// Returns whether the handshake is acceptable for ATS.
    ///
    /// `None` means no TLS session was negotiated, which is never acceptable.
    /// TLS 1.3 is rejected as well: the rule is an exact match on TLS 1.2.
    pub fn check(&self, session: Option<&TlsSession>) -> bool {
        self.evaluate(session).is_acceptable()
    }

    /// Evaluates every rule separately, for diagnostics.
    ///
    /// Rules after a failed protocol check are reported as failed without
    /// being looked at.
    pub fn evaluate(&self, session: Option<&TlsSession>) -> Compliance {
        let session = match session {
            Some(session) => session,
            None => {
                debug!("no TLS session negotiated");
                return Compliance {
                    tls_present: false,
                    protocol_ok: false,
                    cipher_ok: false,
                    signature_ok: self.check_signature.then(|| false),
                };
            }
        };

        if session.version != TlsVersion::Tls12 {
            debug!("protocol {} is not TLS 1.2", session.version);
            return Compliance {
                tls_present: true,
                protocol_ok: false,
                cipher_ok: false,
                signature_ok: self.check_signature.then(|| false),
            };
        }

        let cipher_ok = ACCEPTABLE_CIPHER_SUITES.contains(&session.cipher_suite);
        let signature_ok = if self.check_signature {
            // An empty chain has no leaf to inspect.
            let leaf_ok = session
                .leaf_signature_algorithm()
                .map(|alg| ACCEPTABLE_SIGNATURE_ALGORITHMS.contains(alg))
                .unwrap_or(false);
            Some(leaf_ok)
        } else {
            None
        };
        debug!(
            "cipher 0x{:04x} acceptable: {}, signature acceptable: {:?}",
            session.cipher_suite, cipher_ok, signature_ok
        );

        Compliance {
            tls_present: true,
            protocol_ok: true,
            cipher_ok,
            signature_ok,
        }
    }
}

/// Strict ATS check: protocol, cipher suite and leaf signature algorithm.
pub fn check(session: Option<&TlsSession>) -> bool {
    Checker::strict().check(session)
}
