//! On-disk MSP directory layout for an enrolled identity
//!
//! Fabric tooling (the peer CLI, osnadmin) wants identities as an MSP
//! directory rather than as individual PEM strings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// An enrolled identity. Certificates and keys are PEM text.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Identity {
    pub name: String,
    pub cert: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

/// Write `identity` as an MSP directory and return its path.
///
/// With `path` set the layout is created inside that existing directory;
/// otherwise a new temporary directory is created and kept, and the caller is
/// responsible for removing it.
///
/// `admincerts` receives the identity's own certificate; older Fabric CLIs
/// refuse to start with an empty admincerts directory.
pub fn write_msp_directory(identity: &Identity, path: Option<&Path>) -> Result<PathBuf> {
    let ca = identity.ca.as_deref().ok_or_else(|| {
        Error::ValidationError(format!(
            "identity {} cannot be used as it does not have a CA certificate",
            identity.name
        ))
    })?;

    let msp_path = match path {
        Some(path) => path.to_path_buf(),
        None => tempfile::Builder::new()
            .prefix("fabric-msp-")
            .tempdir()?
            .keep(),
    };

    write_pem(&msp_path.join("admincerts"), "cert.pem", &identity.cert)?;
    write_pem(&msp_path.join("cacerts"), "cert.pem", ca)?;
    write_pem(&msp_path.join("signcerts"), "cert.pem", &identity.cert)?;

    let keystore = msp_path.join("keystore");
    fs::create_dir(&keystore)?;
    if let Some(key) = &identity.private_key {
        fs::write(keystore.join("key.pem"), key)?;
    }

    debug!(identity = %identity.name, path = %msp_path.display(), "Wrote MSP directory");
    Ok(msp_path)
}

fn write_pem(dir: &Path, file_name: &str, contents: &str) -> Result<()> {
    fs::create_dir(dir)?;
    fs::write(dir.join(file_name), contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msp::tests::SAMPLE_CA_CERT;

    fn identity(ca: Option<&str>, key: Option<&str>) -> Identity {
        Identity {
            name: "orderer-admin".to_string(),
            cert: "-----BEGIN CERTIFICATE-----\nadmin\n-----END CERTIFICATE-----\n".to_string(),
            ca: ca.map(String::from),
            private_key: key.map(String::from),
        }
    }

    #[test]
    fn test_write_msp_directory_layout() {
        let dir = tempfile::tempdir().unwrap();
        let id = identity(Some(SAMPLE_CA_CERT), Some("KEY"));

        let path = write_msp_directory(&id, Some(dir.path())).unwrap();

        assert_eq!(path, dir.path());
        assert_eq!(
            fs::read_to_string(path.join("admincerts/cert.pem")).unwrap(),
            id.cert
        );
        assert_eq!(
            fs::read_to_string(path.join("signcerts/cert.pem")).unwrap(),
            id.cert
        );
        assert_eq!(
            fs::read_to_string(path.join("cacerts/cert.pem")).unwrap(),
            SAMPLE_CA_CERT
        );
        assert_eq!(
            fs::read_to_string(path.join("keystore/key.pem")).unwrap(),
            "KEY"
        );
    }

    #[test]
    fn test_keystore_left_empty_without_private_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_msp_directory(&identity(Some(SAMPLE_CA_CERT), None), Some(dir.path()))
            .unwrap();
        assert!(path.join("keystore").is_dir());
        assert_eq!(fs::read_dir(path.join("keystore")).unwrap().count(), 0);
    }

    #[test]
    fn test_temporary_directory_is_created_and_kept() {
        let path = write_msp_directory(&identity(Some(SAMPLE_CA_CERT), None), None).unwrap();
        assert!(path.join("cacerts/cert.pem").is_file());
        fs::remove_dir_all(path).unwrap();
    }

    #[test]
    fn test_identity_without_ca_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_msp_directory(&identity(None, None), Some(dir.path())).unwrap_err();
        assert!(matches!(err, Error::ValidationError(_)));
        assert!(!dir.path().join("admincerts").exists());
    }
}
