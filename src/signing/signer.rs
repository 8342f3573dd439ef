use chrono::{DateTime, Utc};

use crate::engine::types::ChainPolicy;

/// Authenticated attributes attached to a signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedAttribute {
    /// Signing time as seen by the signer
    SigningTime(DateTime<Utc>),
}

/// Certificate plus attributes and policy handed to the signing engine.
///
/// `C` is the engine's native certificate handle.
#[derive(Debug, Clone)]
pub struct SignerDescriptor<C> {
    /// Signing certificate
    pub certificate: C,
    /// Authenticated attributes
    pub authenticated_attributes: Vec<SignedAttribute>,
    /// Chain inclusion policy
    pub chain_policy: ChainPolicy,
}

impl<C> SignerDescriptor<C> {
    /// Build a signer stamped with the current time.
    ///
    /// The stamp is taken here, not when the engine signs. Any suspension
    /// between the two shows up as skew in the recorded signing time.
    pub fn new(certificate: C, chain_policy: ChainPolicy) -> Self {
        Self::with_signing_time(certificate, chain_policy, Utc::now())
    }

    /// Build a signer with an explicit signing time
    pub fn with_signing_time(
        certificate: C,
        chain_policy: ChainPolicy,
        signing_time: DateTime<Utc>,
    ) -> Self {
        Self {
            certificate,
            authenticated_attributes: vec![SignedAttribute::SigningTime(signing_time)],
            chain_policy,
        }
    }

    /// The signing time attribute, if present
    pub fn signing_time(&self) -> Option<DateTime<Utc>> {
        self.authenticated_attributes.iter().find_map(|attr| match attr {
            SignedAttribute::SigningTime(time) => Some(*time),
        })
    }
}
