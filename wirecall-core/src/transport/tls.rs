//! TLS client configuration for the transport.
//!
//! Trust comes from one of three places, in order of precedence:
//!
//! 1. `insecure_skip_verify`: any certificate chain and name is accepted. Handshake
//!    signatures are still checked.
//! 2. `ca`: a dedicated pool holding only the PEM certificates supplied by the caller.
//! 3. The platform's native root certificates.
use super::TransportError;
use rustls::{
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature},
    pki_types::{CertificateDer, ServerName, UnixTime, pem::PemObject},
};
use std::sync::Arc;

/// Builds the client configuration for one call.
pub(crate) fn client_config(
    ca: Option<&str>,
    insecure_skip_verify: bool,
) -> Result<ClientConfig, TransportError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(TransportError::Tls)?;

    if insecure_skip_verify {
        return Ok(builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertVerifier(provider)))
            .with_no_client_auth());
    }

    let roots = match ca {
        Some(pem) => custom_roots(pem)?,
        None => native_roots(),
    };

    Ok(builder
        .with_root_certificates(roots)
        .with_no_client_auth())
}

fn custom_roots(pem: &str) -> Result<RootCertStore, TransportError> {
    let certs = CertificateDer::pem_slice_iter(pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TransportError::InvalidCaCertificate(e.to_string()))?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if ignored > 0 {
        tracing::debug!(ignored, "ignored unparsable CA certificates");
    }
    if added == 0 {
        return Err(TransportError::InvalidCaCertificate(
            "no usable certificate found".to_string(),
        ));
    }

    Ok(roots)
}

fn native_roots() -> RootCertStore {
    let native_certs = rustls_native_certs::load_native_certs();
    if !native_certs.errors.is_empty() {
        // Some certs may still have loaded.
        tracing::debug!("errors loading native certs: {:?}", native_certs.errors);
    }

    let mut roots = RootCertStore::empty();
    roots.add_parsable_certificates(native_certs.certs);
    roots
}

/// A certificate verifier that accepts any certificate chain for any name.
///
/// Handshake signatures are still verified with the provider's algorithms, so the peer
/// must hold the private key of the certificate it presents.
#[derive(Debug)]
struct AcceptAnyCertVerifier(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertVerifier {
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
