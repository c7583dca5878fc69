//! Tip transaction and two-transaction bundle construction
//!
//! A bundle is always `[tip transfer, primary transaction]`. The tip is
//! rebuilt and re-signed for every attempt; the primary transaction is
//! reused as-is. Both must reference the same blockhash or the block engine
//! would accept one half and drop the other.

use serde::{Deserialize, Serialize};
use solana_sdk::{
    hash::Hash,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction,
    transaction::VersionedTransaction,
};

use super::errors::TransactionBuilderError;
use crate::types::RecencyCheckpoint;

/// Wire encoding of each transaction inside `sendBundle` params
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleEncoding {
    #[default]
    Base58,
    Base64,
}

/// Signed tip transfer for one attempt
#[derive(Debug, Clone)]
pub struct SignedFeeTransaction {
    pub tx: VersionedTransaction,
    pub fee_collector: Pubkey,
    pub lamports: u64,
}

impl SignedFeeTransaction {
    /// First (payer) signature, used to track confirmation
    pub fn signature(&self) -> Signature {
        self.tx.signatures.first().copied().unwrap_or_default()
    }
}

/// Build and sign the tip transfer `payer -> fee_collector`.
pub fn build_fee_transaction(
    payer: &Keypair,
    fee_collector: &Pubkey,
    lamports: u64,
    checkpoint: &RecencyCheckpoint,
) -> Result<SignedFeeTransaction, TransactionBuilderError> {
    let ix = system_instruction::transfer(&payer.pubkey(), fee_collector, lamports);

    let message = v0::Message::try_compile(&payer.pubkey(), &[ix], &[], checkpoint.blockhash)
        .map_err(|e| TransactionBuilderError::MessageCompile(e.to_string()))?;

    let tx = VersionedTransaction::try_new(VersionedMessage::V0(message), &[payer])
        .map_err(|e| TransactionBuilderError::Signing(e.to_string()))?;

    Ok(SignedFeeTransaction {
        tx,
        fee_collector: *fee_collector,
        lamports,
    })
}

/// Ordered `(tip, primary)` pair submitted atomically
#[derive(Debug, Clone)]
pub struct Bundle {
    fee: SignedFeeTransaction,
    primary: VersionedTransaction,
}

impl Bundle {
    /// Pair a tip with the primary transaction, checking both use the same
    /// blockhash.
    pub fn new(
        fee: SignedFeeTransaction,
        primary: VersionedTransaction,
    ) -> Result<Self, TransactionBuilderError> {
        let fee_hash = *fee.tx.message.recent_blockhash();
        let primary_hash = *primary.message.recent_blockhash();
        if fee_hash != primary_hash {
            return Err(TransactionBuilderError::BlockhashMismatch {
                fee: fee_hash.to_string(),
                primary: primary_hash.to_string(),
            });
        }
        Ok(Self { fee, primary })
    }

    pub fn fee(&self) -> &SignedFeeTransaction {
        &self.fee
    }

    pub fn primary(&self) -> &VersionedTransaction {
        &self.primary
    }

    pub fn fee_signature(&self) -> Signature {
        self.fee.signature()
    }

    pub fn blockhash(&self) -> Hash {
        *self.fee.tx.message.recent_blockhash()
    }

    /// Serialize both transactions once, in bundle order.
    pub fn encode(&self, encoding: BundleEncoding) -> Result<Vec<String>, TransactionBuilderError> {
        [&self.fee.tx, &self.primary]
            .into_iter()
            .map(|tx| encode_transaction(tx, encoding))
            .collect()
    }
}

/// Serialize a transaction to its wire bytes and text-encode it
pub fn encode_transaction(
    tx: &VersionedTransaction,
    encoding: BundleEncoding,
) -> Result<String, TransactionBuilderError> {
    let bytes =
        bincode::serialize(tx).map_err(|e| TransactionBuilderError::decode(e.to_string()))?;
    Ok(match encoding {
        BundleEncoding::Base58 => bs58::encode(bytes).into_string(),
        BundleEncoding::Base64 => {
            use base64::Engine;
            base64::engine::general_purpose::STANDARD.encode(bytes)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::system_program;

    fn checkpoint() -> RecencyCheckpoint {
        RecencyCheckpoint::new(Hash::new_unique(), 500)
    }

    fn primary_for(payer: &Keypair, blockhash: Hash) -> VersionedTransaction {
        let ix = system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1);
        let msg = v0::Message::try_compile(&payer.pubkey(), &[ix], &[], blockhash).unwrap();
        VersionedTransaction::try_new(VersionedMessage::V0(msg), &[payer]).unwrap()
    }

    #[test]
    fn test_fee_transaction_transfers_to_collector() {
        let payer = Keypair::new();
        let collector = Pubkey::new_unique();
        let cp = checkpoint();

        let fee = build_fee_transaction(&payer, &collector, 10_000, &cp).unwrap();

        assert_eq!(fee.fee_collector, collector);
        assert_eq!(fee.lamports, 10_000);
        assert_eq!(*fee.tx.message.recent_blockhash(), cp.blockhash);
        let keys = fee.tx.message.static_account_keys();
        assert_eq!(keys[0], payer.pubkey());
        assert!(keys.contains(&collector));
        assert!(keys.contains(&system_program::id()));
        assert!(fee.tx.verify_with_results().iter().all(|ok| *ok));
    }

    #[test]
    fn test_fee_signature_is_deterministic() {
        let payer = Keypair::new();
        let collector = Pubkey::new_unique();
        let cp = checkpoint();

        let a = build_fee_transaction(&payer, &collector, 5_000, &cp).unwrap();
        let b = build_fee_transaction(&payer, &collector, 5_000, &cp).unwrap();
        assert_eq!(a.signature(), b.signature());

        let other = build_fee_transaction(&payer, &Pubkey::new_unique(), 5_000, &cp).unwrap();
        assert_ne!(a.signature(), other.signature());
    }

    #[test]
    fn test_bundle_rejects_mismatched_blockhash() {
        let payer = Keypair::new();
        let cp = checkpoint();
        let fee = build_fee_transaction(&payer, &Pubkey::new_unique(), 1, &cp).unwrap();
        let primary = primary_for(&payer, Hash::new_unique());

        let err = Bundle::new(fee, primary).unwrap_err();
        assert!(matches!(err, TransactionBuilderError::BlockhashMismatch { .. }));
    }

    #[test]
    fn test_bundle_encodes_fee_first() {
        let payer = Keypair::new();
        let cp = checkpoint();
        let fee = build_fee_transaction(&payer, &Pubkey::new_unique(), 1, &cp).unwrap();
        let primary = primary_for(&payer, cp.blockhash);
        let bundle = Bundle::new(fee.clone(), primary.clone()).unwrap();

        let encoded = bundle.encode(BundleEncoding::Base58).unwrap();
        assert_eq!(encoded.len(), 2);

        let first: VersionedTransaction =
            bincode::deserialize(&bs58::decode(&encoded[0]).into_vec().unwrap()).unwrap();
        assert_eq!(first.signatures[0], fee.signature());
        assert_eq!(bundle.fee_signature(), fee.signature());

        let b64 = bundle.encode(BundleEncoding::Base64).unwrap();
        assert_ne!(b64[1], encoded[1]);
    }
}
