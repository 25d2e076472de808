#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for Burrow
//!
//! These tests run relays and whole sessions against a TLS mock proxy and
//! an in-memory control plane.

mod control_test;
mod relay_test;
mod session_test;

use burrow_common::TlsConfig;
use burrow_core::transport::Dialer;
use burrow_core::TransportConfig;
use burrow_tests::TestCert;
use std::path::Path;

/// Dialer trusting `cert`, addressing the proxy as `localhost`.
pub fn tls_dialer(ca: &Path) -> Dialer {
    Dialer::new(&TransportConfig::Tls(tls_config(ca))).unwrap()
}

pub fn tls_config(ca: &Path) -> TlsConfig {
    TlsConfig {
        ca_cert_path: Some(ca.to_path_buf()),
        server_name: Some("localhost".to_string()),
        skip_verify: false,
    }
}

pub fn test_cert() -> (TestCert, std::path::PathBuf) {
    let cert = TestCert::localhost();
    let ca = cert.write_ca();
    (cert, ca)
}
