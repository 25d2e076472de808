//! TLS transport using rustls

use super::socket_tuning::configure_socket_silent;
use super::BoxedStream;
use burrow_common::TlsConfig;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pemfile::certs;
use std::fs::File;
use std::io::{self, BufReader, ErrorKind};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::warn;

fn load_certs(path: &Path) -> io::Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Accepts any server certificate. Signatures are still checked so the
/// handshake itself stays well-formed.
#[derive(Debug)]
struct NoVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

pub fn create_client_config(config: &TlsConfig) -> io::Result<Arc<ClientConfig>> {
    let provider = provider();
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| io::Error::new(ErrorKind::InvalidInput, format!("TLS config error: {e}")))?;

    if config.skip_verify {
        warn!("TLS certificate verification disabled for proxy connections");
        let client_config = builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerification(provider)))
            .with_no_client_auth();
        return Ok(Arc::new(client_config));
    }

    let mut root_store = RootCertStore::empty();
    if let Some(ca_path) = &config.ca_cert_path {
        for cert in load_certs(ca_path)? {
            root_store.add(cert).map_err(|e| {
                io::Error::new(ErrorKind::InvalidData, format!("invalid CA cert: {e}"))
            })?;
        }
    } else {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    let client_config = builder
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(Arc::new(client_config))
}

/// Derives the SNI name: the configured override, else the host part of `addr`.
pub fn server_name_for(addr: &str, server_name: Option<&str>) -> io::Result<ServerName<'static>> {
    let host = match server_name {
        Some(name) => name,
        None => addr.rsplit_once(':').map_or(addr, |(host, _)| host),
    };
    ServerName::try_from(host.to_string())
        .map_err(|e| io::Error::new(ErrorKind::InvalidInput, format!("invalid server name: {e}")))
}

/// TLS client prepared once and reused for every dial.
#[derive(Clone)]
pub struct TlsDialer {
    connector: TlsConnector,
    server_name: Option<String>,
}

impl TlsDialer {
    pub fn new(config: &TlsConfig) -> io::Result<Self> {
        Ok(Self {
            connector: TlsConnector::from(create_client_config(config)?),
            server_name: config.server_name.clone(),
        })
    }

    pub async fn connect(&self, addr: &str) -> io::Result<BoxedStream> {
        let server_name = server_name_for(addr, self.server_name.as_deref())?;

        let tcp_stream = TcpStream::connect(addr).await?;
        configure_socket_silent(&tcp_stream);

        let tls_stream = self.connector.connect(server_name, tcp_stream).await?;
        Ok(Box::pin(tls_stream))
    }
}
