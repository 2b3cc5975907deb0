//! Biometric template storage trait.

use crate::StoreError;
use rollcall_types::{StudentId, Timestamp};
use serde::{Deserialize, Serialize};

/// An encrypted, L2-normalized embedding owned by one identity.
///
/// Replaced wholesale on re-enrollment, never partially updated. The
/// vector is always normalized before encryption; plaintext never rests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedTemplate {
    pub owner: StudentId,
    pub ciphertext: Vec<u8>,
    pub updated_at: Timestamp,
}

/// Trait for template storage operations.
pub trait TemplateStore: Send + Sync {
    /// Store a template, replacing any prior one for the same owner.
    fn put_template(&self, template: &EncryptedTemplate) -> Result<(), StoreError>;

    fn get_template(&self, owner: StudentId) -> Result<Option<EncryptedTemplate>, StoreError>;

    /// Whether the identity has a registered template at all.
    fn has_template(&self, owner: StudentId) -> Result<bool, StoreError> {
        self.get_template(owner).map(|t| t.is_some())
    }
}
