//! TLS client configuration for LDAPS and StartTLS
//!
//! Trust anchors come from `root_ca_cert` files and base64 encoded
//! `root_ca_cert_value` entries, falling back to the platform store when
//! neither is configured.

use base64::Engine;
use dirgate_core::config::TlsVersion;
use dirgate_core::{Error, Result, ServerConfig};
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{
    Certificate, ClientConfig, PrivateKey, RootCertStore, ServerName, SupportedCipherSuite,
    SupportedProtocolVersion,
};
use std::io::BufReader;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Build the rustls configuration for one server definition
pub fn client_config(config: &ServerConfig) -> Result<Arc<ClientConfig>> {
    let suites = cipher_suites(&config.tls_ciphers)?;
    let versions = protocol_versions(config.min_tls_version);

    let builder = ClientConfig::builder()
        .with_cipher_suites(&suites)
        .with_safe_default_kx_groups()
        .with_protocol_versions(&versions)
        .map_err(|e| Error::Tls(format!("Unsupported TLS settings: {}", e)))?
        .with_root_certificates(root_store(config)?);

    let mut tls_config = match client_identity(config)? {
        Some((certs, key)) => builder
            .with_client_auth_cert(certs, key)
            .map_err(|e| Error::Tls(format!("Invalid client certificate: {}", e)))?,
        None => builder.with_no_client_auth(),
    };

    if config.ssl_skip_verify {
        warn!(
            "TLS certificate verification is disabled for LDAP server {}",
            config.host
        );
        tls_config
            .dangerous()
            .set_certificate_verifier(Arc::new(NoCertificateVerification));
    }

    Ok(Arc::new(tls_config))
}

fn protocol_versions(min: Option<TlsVersion>) -> Vec<&'static SupportedProtocolVersion> {
    match min {
        Some(TlsVersion::Tls13) => vec![&rustls::version::TLS13],
        Some(TlsVersion::Tls12) | None => vec![&rustls::version::TLS12, &rustls::version::TLS13],
    }
}

/// Resolve configured cipher names against the suites rustls supports
fn cipher_suites(names: &[String]) -> Result<Vec<SupportedCipherSuite>> {
    if names.is_empty() {
        return Ok(rustls::DEFAULT_CIPHER_SUITES.to_vec());
    }

    names
        .iter()
        .map(|name| {
            rustls::ALL_CIPHER_SUITES
                .iter()
                .copied()
                .find(|suite| cipher_name_matches(suite, name))
                .ok_or_else(|| Error::Tls(format!("Unsupported TLS cipher suite: {}", name)))
        })
        .collect()
}

/// TLS 1.3 suites are accepted with or without rustls' `TLS13_` prefix
fn cipher_name_matches(suite: &SupportedCipherSuite, name: &str) -> bool {
    let rustls_name = format!("{:?}", suite.suite());
    let name = name.trim();

    rustls_name.eq_ignore_ascii_case(name)
        || rustls_name
            .replacen("TLS13_", "TLS_", 1)
            .eq_ignore_ascii_case(name)
}

fn root_store(config: &ServerConfig) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();

    for path in config.root_ca_cert.split_whitespace() {
        let pem = std::fs::read(path)
            .map_err(|e| Error::Tls(format!("Failed to read CA certificate {}: {}", path, e)))?;
        add_pem_roots(&mut roots, &pem, path)?;
    }

    for (index, value) in config.root_ca_cert_value.iter().enumerate() {
        let pem = decode_base64(value, "root_ca_cert_value")?;
        add_pem_roots(&mut roots, &pem, &format!("root_ca_cert_value[{}]", index))?;
    }

    if roots.is_empty() {
        let native = rustls_native_certs::load_native_certs()
            .map_err(|e| Error::Tls(format!("Failed to load system certificates: {}", e)))?;
        let certs: Vec<Vec<u8>> = native.into_iter().map(|cert| cert.0).collect();
        let (added, ignored) = roots.add_parsable_certificates(&certs);
        debug!(
            "Loaded {} system CA certificates ({} ignored)",
            added, ignored
        );
    }

    Ok(roots)
}

fn add_pem_roots(roots: &mut RootCertStore, pem: &[u8], source: &str) -> Result<()> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(pem))
        .map_err(|e| Error::Tls(format!("Failed to parse CA certificate {}: {}", source, e)))?;

    let (added, _) = roots.add_parsable_certificates(&certs);
    if added == 0 {
        return Err(Error::Tls(format!(
            "Failed to append CA certificate {}",
            source
        )));
    }

    Ok(())
}

/// Client certificate chain and key, from files or inline values
fn client_identity(config: &ServerConfig) -> Result<Option<(Vec<Certificate>, PrivateKey)>> {
    let (cert_pem, key_pem) = if !config.client_cert.is_empty() {
        let cert = std::fs::read(&config.client_cert).map_err(|e| {
            Error::Tls(format!(
                "Failed to read client certificate {}: {}",
                config.client_cert, e
            ))
        })?;
        let key = std::fs::read(&config.client_key).map_err(|e| {
            Error::Tls(format!(
                "Failed to read client key {}: {}",
                config.client_key, e
            ))
        })?;
        (cert, key)
    } else if !config.client_cert_value.is_empty() {
        (
            decode_base64(&config.client_cert_value, "client_cert_value")?,
            decode_base64(&config.client_key_value, "client_key_value")?,
        )
    } else {
        return Ok(None);
    };

    let certs: Vec<Certificate> = rustls_pemfile::certs(&mut BufReader::new(&cert_pem[..]))
        .map_err(|e| Error::Tls(format!("Failed to parse client certificate: {}", e)))?
        .into_iter()
        .map(Certificate)
        .collect();
    if certs.is_empty() {
        return Err(Error::Tls("No client certificate found".into()));
    }

    Ok(Some((certs, private_key(&key_pem)?)))
}

fn private_key(pem: &[u8]) -> Result<PrivateKey> {
    let mut reader = BufReader::new(pem);

    loop {
        let item = rustls_pemfile::read_one(&mut reader)
            .map_err(|e| Error::Tls(format!("Failed to parse client key: {}", e)))?;

        match item {
            Some(rustls_pemfile::Item::RSAKey(key))
            | Some(rustls_pemfile::Item::PKCS8Key(key))
            | Some(rustls_pemfile::Item::ECKey(key)) => return Ok(PrivateKey(key)),
            Some(_) => continue,
            None => return Err(Error::Tls("No private key found".into())),
        }
    }
}

fn decode_base64(value: &str, field: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|e| Error::Tls(format!("Failed to decode {}: {}", field, e)))
}

/// Accepts any server certificate when `ssl_skip_verify` is set
struct NoCertificateVerification;

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}
