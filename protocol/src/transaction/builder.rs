//! Transaction construction via the builder pattern.
//!
//! The builder produces unsigned [`Transaction`] drafts; signing happens
//! separately in [`super::signing`] because the key material (sender key,
//! one-time deposit key) is usually not available where the transaction is
//! assembled.

use crate::config::TX_GAS;
use crate::crypto::hash::Address;

use super::types::{
    DepositData, MintData, RedeemData, SendData, Transaction, TxKind, UpdateData,
};

/// Fluent builder for unsigned [`Transaction`] drafts.
///
/// Defaults: kind `Public`, gas limit [`TX_GAS`], everything else zero or
/// absent.
///
/// ```
/// use veil_protocol::transaction::TransactionBuilder;
///
/// let tx = TransactionBuilder::new()
///     .nonce(1)
///     .gas_price(1_000)
///     .amount(50)
///     .build();
/// assert!(!tx.is_signed());
/// ```
pub struct TransactionBuilder {
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    recipient: Option<Address>,
    amount: u128,
    payload: Vec<u8>,
    kind: TxKind,
}

impl TransactionBuilder {
    /// A public transaction with default fields.
    pub fn new() -> Self {
        Self {
            nonce: 0,
            gas_price: 0,
            gas_limit: TX_GAS,
            recipient: None,
            amount: 0,
            payload: Vec::new(),
            kind: TxKind::Public,
        }
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = gas_price;
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn recipient(mut self, recipient: Address) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn amount(mut self, amount: u128) -> Self {
        self.amount = amount;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Set the operation (and its confidential payload) directly.
    pub fn kind(mut self, kind: TxKind) -> Self {
        self.kind = kind;
        self
    }

    /// Shorthand for a Mint operation.
    pub fn mint(self, data: MintData) -> Self {
        self.kind(TxKind::Mint(data))
    }

    /// Shorthand for a Send operation.
    pub fn send(self, data: SendData) -> Self {
        self.kind(TxKind::Send(data))
    }

    /// Shorthand for a Deposit operation.
    pub fn deposit(self, data: DepositData) -> Self {
        self.kind(TxKind::Deposit(data))
    }

    /// Shorthand for a Redeem operation.
    pub fn redeem(self, data: RedeemData) -> Self {
        self.kind(TxKind::Redeem(data))
    }

    /// Shorthand for an Update operation.
    pub fn update(self, data: UpdateData) -> Self {
        self.kind(TxKind::Update(data))
    }

    /// Finish: an unsigned transaction.
    pub fn build(self) -> Transaction {
        Transaction {
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            recipient: self.recipient,
            amount: self.amount,
            payload: self.payload,
            kind: self.kind,
            signature: None,
        }
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::keccak256;

    #[test]
    fn defaults_are_public_and_unsigned() {
        let tx = TransactionBuilder::new().build();
        assert_eq!(tx.kind, TxKind::Public);
        assert_eq!(tx.gas_limit, TX_GAS);
        assert!(!tx.is_signed());
    }

    #[test]
    fn builder_sets_all_public_fields() {
        let to = Address([5u8; 20]);
        let tx = TransactionBuilder::new()
            .nonce(3)
            .gas_price(7)
            .gas_limit(30_000)
            .recipient(to)
            .amount(999)
            .payload(vec![1, 2])
            .build();

        assert_eq!(tx.nonce, 3);
        assert_eq!(tx.gas_price, 7);
        assert_eq!(tx.gas_limit, 30_000);
        assert_eq!(tx.recipient, Some(to));
        assert_eq!(tx.amount, 999);
        assert_eq!(tx.payload, vec![1, 2]);
    }

    #[test]
    fn mint_shorthand_sets_kind() {
        let tx = TransactionBuilder::new()
            .mint(MintData {
                value: 10,
                serial: keccak256(b"sn"),
                commitment: keccak256(b"cmt"),
                proof: vec![0xAB],
            })
            .build();
        assert!(matches!(tx.kind, TxKind::Mint(_)));
        assert!(tx.kind.is_confidential());
    }
}
