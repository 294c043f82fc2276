//! # Credential Staging
//!
//! Some backend clients can only consume a credential from disk. Staging
//! writes the decoded secret material to a named temp file so the client can
//! read it during initialization; the file is deleted on every exit path -
//! success, connector failure, or insert failure - before control returns to
//! the caller.

use crate::constants::KERBEROS_CREDENTIAL_TYPE;
use crate::credential::Credential;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// A credential artifact staged on disk for the lifetime of one handle
/// construction
///
/// Dropping the value removes the file.
#[derive(Debug)]
pub struct StagedCredential {
    file: NamedTempFile,
}

impl StagedCredential {
    /// Write the credential's decoded secret material to a temp file
    ///
    /// Only kerberos material has an on-disk representation; any other type
    /// is rejected here rather than handed to a backend that cannot read it.
    pub fn stage(credential: &Credential) -> anyhow::Result<Self> {
        anyhow::ensure!(
            credential.credential_type() == KERBEROS_CREDENTIAL_TYPE,
            "unsupported credential type for staging: {}",
            credential.credential_type()
        );

        let decoded = B64
            .decode(credential.value())
            .map_err(|e| anyhow::anyhow!("credential value is not valid base64: {e}"))?;

        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}-", credential.name()))
            .suffix(".cred")
            .tempfile()?;
        file.write_all(&decoded)?;
        file.flush()?;

        debug!(
            credential = credential.name(),
            path = %file.path().display(),
            "staged credential artifact"
        );
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
