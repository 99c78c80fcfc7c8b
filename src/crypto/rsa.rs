use crate::crypto::HashAlg;
use crate::crypto::errors::{CryptoResult, Error};
use openssl::pkey::{Id, PKey, Private, Public};
use openssl::sign::{Signer, Verifier};
use openssl::x509::X509;
use std::fmt;

/// Represents an RSA PKCS#1 v1.5 signature
#[derive(Clone)]
pub struct RsaSignature {
    data: Vec<u8>,
}

impl RsaSignature {
    /// Create a new RSA signature
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    /// Get the signature data as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for RsaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaSignature")
            .field("size", &self.data.len())
            .finish()
    }
}

/// RSA private key wrapper
#[derive(Debug, Clone)]
pub struct RsaPrivateKey {
    key: PKey<Private>,
}

impl RsaPrivateKey {
    /// Load from PEM-encoded PKCS#1/PKCS#8.
    ///
    /// Encrypted keys are decrypted with `passphrase`, which is ignored for
    /// unencrypted keys. OpenSSL never prompts for a missing passphrase.
    pub fn from_pem(pem_bytes: impl AsRef<[u8]>, passphrase: &str) -> CryptoResult<Self> {
        let key = PKey::private_key_from_pem_passphrase(pem_bytes.as_ref(), passphrase.as_bytes())?;
        Self::from_pkey(key)
    }

    fn from_pkey(key: PKey<Private>) -> CryptoResult<Self> {
        if key.id() != Id::RSA {
            return Err(Error::Invalid(format!(
                "Unsupported private key type: {:?}",
                key.id()
            )));
        }
        Ok(Self { key })
    }

    pub(crate) fn pkey(&self) -> &PKey<Private> {
        &self.key
    }
}

/// RSA public key wrapper
#[derive(Debug, Clone)]
pub struct RsaPublicKey {
    key: PKey<Public>,
}

impl RsaPublicKey {
    /// Extract the subject public key of a PEM-encoded X.509 certificate
    pub fn from_certificate_pem(pem_bytes: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let cert = X509::from_pem(pem_bytes.as_ref())?;
        Self::from_pkey(cert.public_key()?)
    }

    fn from_pkey(key: PKey<Public>) -> CryptoResult<Self> {
        if key.id() != Id::RSA {
            return Err(Error::Invalid(format!(
                "Unsupported public key type: {:?}",
                key.id()
            )));
        }
        Ok(Self { key })
    }

    pub(crate) fn pkey(&self) -> &PKey<Public> {
        &self.key
    }
}

/// Sign data using RSA private key (PKCS#1 v1.5 with DigestInfo)
pub fn sign(
    private_key: &RsaPrivateKey,
    data: impl AsRef<[u8]>,
    hash_alg: HashAlg,
) -> CryptoResult<RsaSignature> {
    let mut signer = Signer::new((&hash_alg).into(), private_key.pkey())?;
    signer.update(data.as_ref())?;
    Ok(RsaSignature::new(signer.sign_to_vec()?))
}

/// Verify RSA signature
pub fn verify(
    public_key: &RsaPublicKey,
    data: impl AsRef<[u8]>,
    signature: &RsaSignature,
    hash_alg: HashAlg,
) -> CryptoResult<bool> {
    let mut verifier = Verifier::new((&hash_alg).into(), public_key.pkey())?;
    verifier.update(data.as_ref())?;
    Ok(verifier.verify(signature.as_bytes())?)
}
