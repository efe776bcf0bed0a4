use anyhow::{Context, Result};
use keyring::Entry;

use crate::auth::flow::normalize_email;

const SERVICE_NAME: &str = "tripledger";

/// OS-keychain storage for the optional "remember my password" path.
///
/// Entries are keyed by the normalized email, so "Jane@X.com" and
/// "jane@x.com" resolve to the same credential regardless of how the
/// address was typed at the prompt.
pub struct CredentialStore;

impl CredentialStore {
    fn entry(email: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &normalize_email(email))
            .context("Failed to create keyring entry")
    }

    /// Store a password for an email in the OS keychain
    pub fn store(email: &str, password: &str) -> Result<()> {
        Self::entry(email)?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    /// Retrieve the password for an email from the OS keychain
    pub fn get_password(email: &str) -> Result<String> {
        Self::entry(email)?
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Delete stored credentials for an email
    pub fn delete(email: &str) -> Result<()> {
        Self::entry(email)?
            .delete_credential()
            .context("Failed to delete credential from keychain")
    }

    /// Check if credentials exist for an email
    pub fn has_credentials(email: &str) -> bool {
        Self::entry(email)
            .map(|e| e.get_password().is_ok())
            .unwrap_or(false)
    }
}
