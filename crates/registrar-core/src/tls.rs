use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::{Certificate, PrivateKey, ServerConfig};
use tokio_rustls::TlsAcceptor;

use crate::error::{Error, Result};

/// Build a server-side acceptor from PEM certificate chain and key files
pub fn build_tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor> {
    let certs = load_cert_chain(cert_path)?;
    let key = load_private_key(key_path)?;

    let config = ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::tls(format!("invalid certificate/key pair: {}", e)))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path)
        .map_err(|e| Error::tls(format!("open {}: {}", path.display(), e)))?;
    Ok(BufReader::new(file))
}

fn load_cert_chain(path: &Path) -> Result<Vec<Certificate>> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .map_err(|e| Error::tls(format!("read certs from {}: {}", path.display(), e)))?;
    if certs.is_empty() {
        return Err(Error::tls(format!("no certificates found in {}", path.display())));
    }
    Ok(certs.into_iter().map(Certificate).collect())
}

fn load_private_key(path: &Path) -> Result<PrivateKey> {
    let mut keys = rustls_pemfile::pkcs8_private_keys(&mut open(path)?)
        .map_err(|e| Error::tls(format!("read pkcs8 keys from {}: {}", path.display(), e)))?;

    if keys.is_empty() {
        keys = rustls_pemfile::rsa_private_keys(&mut open(path)?)
            .map_err(|e| Error::tls(format!("read rsa keys from {}: {}", path.display(), e)))?;
    }

    if keys.is_empty() {
        return Err(Error::tls(format!("no private keys found in {}", path.display())));
    }

    Ok(PrivateKey(keys.remove(0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acceptor_from_self_signed_pem() {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        std::fs::write(&cert_path, cert.pem()).unwrap();
        std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();

        assert!(build_tls_acceptor(&cert_path, &key_path).is_ok());
    }

    #[test]
    fn missing_files_are_tls_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = build_tls_acceptor(&dir.path().join("nope.pem"), &dir.path().join("nope.key"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Tls(_)));
    }
}
