//! Wallet policy over the ledger book: atomic check-then-append debits and
//! admin-trusted credits.

use std::fmt;

use contracts::{LedgerEntry, LedgerEntryKind};

use crate::ledger::LedgerBook;

/// Expected wallet rejections. Callers branch on these explicitly; they
/// are never used as control-flow exceptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    InsufficientFunds { balance: i64, requested: i64 },
    InvalidAdjustment { balance: i64, amount: i64 },
    InvalidAmount(i64),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientFunds { balance, requested } => {
                write!(f, "insufficient funds: balance={balance} requested={requested}")
            }
            Self::InvalidAdjustment { balance, amount } => {
                write!(
                    f,
                    "adjustment would underflow: balance={balance} amount={amount}"
                )
            }
            Self::InvalidAmount(amount) => write!(f, "invalid amount: {amount}"),
        }
    }
}

impl std::error::Error for WalletError {}

#[derive(Debug, Clone)]
pub struct Wallet {
    book: LedgerBook,
}

impl Wallet {
    pub fn new(sponsor_id: impl Into<String>) -> Self {
        Self {
            book: LedgerBook::new(sponsor_id),
        }
    }

    pub fn restore(sponsor_id: impl Into<String>, entries: Vec<LedgerEntry>) -> Self {
        Self {
            book: LedgerBook::restore(sponsor_id, entries),
        }
    }

    pub fn balance(&self) -> i64 {
        self.book.balance()
    }

    pub fn book(&self) -> &LedgerBook {
        &self.book
    }

    /// Atomically check `balance >= amount` and append the debit entry.
    /// The caller must hold the sponsor's lock for the whole check-then-write
    /// unit; the wallet itself performs no write on failure.
    pub fn try_debit(
        &mut self,
        amount: i64,
        reference: &str,
        now: i64,
    ) -> Result<LedgerEntry, WalletError> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        let balance = self.book.balance();
        if balance < amount {
            return Err(WalletError::InsufficientFunds {
                balance,
                requested: amount,
            });
        }
        Ok(self.book.append(LedgerEntryKind::Debit, -amount, reference, now))
    }

    /// Pre-approved deposit credit. Always positive.
    pub fn deposit(
        &mut self,
        amount: i64,
        reference: &str,
        now: i64,
    ) -> Result<LedgerEntry, WalletError> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        if self.book.balance().checked_add(amount).is_none() {
            return Err(WalletError::InvalidAmount(amount));
        }
        Ok(self.book.append(LedgerEntryKind::Deposit, amount, reference, now))
    }

    /// Signed admin adjustment. Negative adjustments are permitted but must
    /// not produce a negative resulting balance.
    pub fn adjust(
        &mut self,
        amount: i64,
        reference: &str,
        now: i64,
    ) -> Result<LedgerEntry, WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        let balance = self.book.balance();
        match balance.checked_add(amount) {
            Some(new_balance) if new_balance >= 0 => {}
            _ => return Err(WalletError::InvalidAdjustment { balance, amount }),
        }
        Ok(self
            .book
            .append(LedgerEntryKind::Adjustment, amount, reference, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_rejected_when_balance_too_low() {
        let mut wallet = Wallet::new("spn_001");
        wallet.deposit(30, "txn:00000001", 1).expect("deposit");

        let err = wallet.try_debit(45, "cmp:a", 2).expect_err("should fail");
        assert_eq!(
            err,
            WalletError::InsufficientFunds {
                balance: 30,
                requested: 45
            }
        );
        // No write on failure.
        assert_eq!(wallet.balance(), 30);
        assert_eq!(wallet.book().entries().len(), 1);
    }

    #[test]
    fn negative_adjustment_cannot_underflow() {
        let mut wallet = Wallet::new("spn_001");
        wallet.deposit(30, "txn:00000001", 1).expect("deposit");

        let err = wallet
            .adjust(-50, "chargeback", 2)
            .expect_err("should fail");
        assert_eq!(
            err,
            WalletError::InvalidAdjustment {
                balance: 30,
                amount: -50
            }
        );
        assert_eq!(wallet.balance(), 30);
    }

    #[test]
    fn adjustment_down_to_zero_is_allowed() {
        let mut wallet = Wallet::new("spn_001");
        wallet.deposit(30, "txn:00000001", 1).expect("deposit");
        let entry = wallet.adjust(-30, "refund", 2).expect("adjust");
        assert_eq!(entry.resulting_balance, 0);
    }

    #[test]
    fn credits_cannot_overflow_the_balance() {
        let mut wallet = Wallet::new("spn_001");
        wallet
            .deposit(i64::MAX, "txn:00000001", 1)
            .expect("first deposit");

        assert_eq!(
            wallet.deposit(1, "txn:00000002", 2),
            Err(WalletError::InvalidAmount(1))
        );
        assert_eq!(
            wallet.adjust(1, "goodwill credit", 3),
            Err(WalletError::InvalidAdjustment {
                balance: i64::MAX,
                amount: 1
            })
        );
        assert_eq!(wallet.balance(), i64::MAX);
        assert_eq!(wallet.book().entries().len(), 1);
    }

    #[test]
    fn zero_amounts_are_rejected() {
        let mut wallet = Wallet::new("spn_001");
        assert!(matches!(
            wallet.deposit(0, "txn:00000001", 1),
            Err(WalletError::InvalidAmount(0))
        ));
        assert!(matches!(
            wallet.adjust(0, "noop", 1),
            Err(WalletError::InvalidAmount(0))
        ));
        assert!(matches!(
            wallet.try_debit(0, "cmp:a", 1),
            Err(WalletError::InvalidAmount(0))
        ));
    }
}
