//! Owner signatures over an operation hash
//!
//! The Safe expects signatures concatenated in ascending signer address
//! order, 65 bytes each (`r ‖ s ‖ v`). A `BTreeMap` keyed by signer keeps
//! that order without a separate sort step.

use std::collections::BTreeMap;

use alloy::primitives::{Address, Bytes, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

use crate::error::{Error, Result};

pub const SIGNATURE_LEN: usize = 65;

/// `v` marking a pre-validated (approved-hash) signature
const APPROVED_HASH_V: u8 = 1;

/// Signer address → 65-byte signature, ordered by signer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureSet {
    signatures: BTreeMap<Address, [u8; SIGNATURE_LEN]>,
}

impl SignatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign `hash` directly (no message prefix) with each signer
    pub fn sign(hash: &B256, signers: &[&PrivateKeySigner]) -> Result<Self> {
        let mut set = Self::new();
        for signer in signers {
            let signature = signer
                .sign_hash_sync(hash)
                .map_err(|e| Error::Signing(format!("{}: {}", signer.address(), e)))?;

            let mut bytes = [0u8; SIGNATURE_LEN];
            bytes[..32].copy_from_slice(&signature.r().to_be_bytes::<32>());
            bytes[32..64].copy_from_slice(&signature.s().to_be_bytes::<32>());
            bytes[64] = 27 + signature.v() as u8;

            set.insert(signer.address(), bytes);
        }
        Ok(set)
    }

    /// Placeholder signatures for owners who approved the hash on-chain
    ///
    /// Each entry is the owner left-padded to 32 bytes, 32 zero bytes, then
    /// `0x01`.
    pub fn approved_hash_placeholders(owners: &[Address]) -> Self {
        let mut set = Self::new();
        for owner in owners {
            let mut bytes = [0u8; SIGNATURE_LEN];
            bytes[12..32].copy_from_slice(owner.as_slice());
            bytes[64] = APPROVED_HASH_V;
            set.insert(*owner, bytes);
        }
        set
    }

    fn insert(&mut self, signer: Address, signature: [u8; SIGNATURE_LEN]) {
        self.signatures.insert(signer, signature);
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn signers(&self) -> impl Iterator<Item = &Address> {
        self.signatures.keys()
    }

    /// Concatenated signature bytes as `execTransaction` takes them
    pub fn to_bytes(&self) -> Bytes {
        let mut out = Vec::with_capacity(self.signatures.len() * SIGNATURE_LEN);
        for signature in self.signatures.values() {
            out.extend_from_slice(signature);
        }
        Bytes::from(out)
    }
}
