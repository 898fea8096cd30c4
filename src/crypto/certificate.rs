//! The server's RSA public key, taken from its leaf certificate.
//!
//! Only the SubjectPublicKeyInfo is read. Names, validity and the issuer chain
//! are not interpreted.

use der::{Decode, Encode};
use pkcs8::DecodePublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::RsaPublicKey;
use sha2::Sha256;
use signature::Verifier;
use spki::ObjectIdentifier;
use x509_cert::Certificate as X509Certificate;

use crate::message::SIGNATURE_RSA_PKCS1_SHA256;
use crate::Error;

const OID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

pub struct ServerPublicKey {
    key: RsaPublicKey,
}

impl ServerPublicKey {
    /// Extract the RSA key from a DER certificate.
    pub fn from_certificate(cert_der: &[u8]) -> Result<Self, Error> {
        let cert = X509Certificate::from_der(cert_der)
            .map_err(|e| Error::CertificateError(format!("Failed to parse certificate: {e}")))?;
        let spki = &cert.tbs_certificate.subject_public_key_info;

        if spki.algorithm.oid != OID_RSA_ENCRYPTION {
            return Err(Error::CertificateError(format!(
                "Unsupported public key algorithm: {}",
                spki.algorithm.oid
            )));
        }

        let spki_der = spki
            .to_der()
            .map_err(|e| Error::CertificateError(format!("Failed to encode SPKI: {e}")))?;
        let key = RsaPublicKey::from_public_key_der(&spki_der)
            .map_err(|e| Error::CertificateError(format!("Invalid RSA public key: {e}")))?;

        Ok(ServerPublicKey { key })
    }

    /// Check `signature` over `data` with the given SignatureAndHashAlgorithm.
    pub fn verify(&self, algorithm: u16, data: &[u8], signature: &[u8]) -> Result<(), Error> {
        if algorithm != SIGNATURE_RSA_PKCS1_SHA256 {
            return Err(Error::BadServerSignature(format!(
                "Unsupported signature algorithm: {:#06x}",
                algorithm
            )));
        }

        let verifying_key = VerifyingKey::<Sha256>::new(self.key.clone());
        let signature = Signature::try_from(signature)
            .map_err(|_| Error::BadServerSignature("Invalid signature format".into()))?;

        verifying_key
            .verify(data, &signature)
            .map_err(|_| Error::BadServerSignature("RSA PKCS#1 v1.5 verification failed".into()))
    }
}

impl std::fmt::Debug for ServerPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerPublicKey").finish_non_exhaustive()
    }
}
