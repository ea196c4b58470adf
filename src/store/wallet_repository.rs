use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::StoreError;
use crate::domain::{UserId, Wallet};

/// Durable storage of wallet aggregates, keyed by user id.
///
/// `update` is a conditional write: the wallet row is the one hot row in
/// the system, and concurrent payments for the same user would otherwise
/// lose updates. The write succeeds only when the stored version equals
/// the version the caller loaded; on success the wallet's version is
/// bumped in place.
pub trait WalletRepository: Send + Sync {
    fn save(&self, wallet: &Wallet) -> Result<(), StoreError>;
    fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Wallet>, StoreError>;
    fn update(&self, wallet: &mut Wallet) -> Result<(), StoreError>;
}

/// In-memory wallet store with optimistic version checking.
#[derive(Clone, Default)]
pub struct InMemoryWalletRepository {
    wallets: Arc<RwLock<HashMap<UserId, Wallet>>>,
}

impl InMemoryWalletRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WalletRepository for InMemoryWalletRepository {
    fn save(&self, wallet: &Wallet) -> Result<(), StoreError> {
        let mut wallets = self
            .wallets
            .write()
            .map_err(|_| StoreError::LockPoisoned("wallet write"))?;
        wallets.insert(wallet.user_id().clone(), wallet.clone());
        Ok(())
    }

    fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Wallet>, StoreError> {
        let wallets = self
            .wallets
            .read()
            .map_err(|_| StoreError::LockPoisoned("wallet read"))?;
        Ok(wallets.get(user_id).cloned())
    }

    fn update(&self, wallet: &mut Wallet) -> Result<(), StoreError> {
        let mut wallets = self
            .wallets
            .write()
            .map_err(|_| StoreError::LockPoisoned("wallet write"))?;

        let stored_version = wallets
            .get(wallet.user_id())
            .map(|stored| stored.version())
            .unwrap_or(0);

        if stored_version != wallet.version() {
            return Err(StoreError::VersionConflict {
                user_id: wallet.user_id().to_string(),
                expected: wallet.version(),
                actual: stored_version,
            });
        }

        wallet.bump_version();
        wallets.insert(wallet.user_id().clone(), wallet.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, Money};

    fn wallet(balance: &str) -> Wallet {
        Wallet::new(
            UserId::new("user-123").unwrap(),
            Money::from_str(balance, Currency::ARS).unwrap(),
        )
        .unwrap()
    }

    fn ars(s: &str) -> Money {
        Money::from_str(s, Currency::ARS).unwrap()
    }

    #[test]
    fn save_and_find() {
        let repo = InMemoryWalletRepository::new();
        repo.save(&wallet("500.00")).unwrap();

        let loaded = repo
            .find_by_user_id(&UserId::new("user-123").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(*loaded.balance(), ars("500.00"));
    }

    #[test]
    fn update_bumps_version() {
        let repo = InMemoryWalletRepository::new();
        repo.save(&wallet("500.00")).unwrap();

        let user = UserId::new("user-123").unwrap();
        let mut loaded = repo.find_by_user_id(&user).unwrap().unwrap();
        loaded.debit(&ars("100.00")).unwrap();
        repo.update(&mut loaded).unwrap();
        assert_eq!(loaded.version(), 1);

        let stored = repo.find_by_user_id(&user).unwrap().unwrap();
        assert_eq!(*stored.balance(), ars("400.00"));
        assert_eq!(stored.version(), 1);
    }

    #[test]
    fn stale_update_conflicts() {
        let repo = InMemoryWalletRepository::new();
        repo.save(&wallet("500.00")).unwrap();

        let user = UserId::new("user-123").unwrap();
        // Two handlers load the same version concurrently.
        let mut first = repo.find_by_user_id(&user).unwrap().unwrap();
        let mut second = repo.find_by_user_id(&user).unwrap().unwrap();

        first.debit(&ars("100.00")).unwrap();
        repo.update(&mut first).unwrap();

        second.debit(&ars("200.00")).unwrap();
        let err = repo.update(&mut second).unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));

        // The losing write must not have landed.
        let stored = repo.find_by_user_id(&user).unwrap().unwrap();
        assert_eq!(*stored.balance(), ars("400.00"));
    }

    #[test]
    fn retry_after_conflict_succeeds() {
        let repo = InMemoryWalletRepository::new();
        repo.save(&wallet("500.00")).unwrap();

        let user = UserId::new("user-123").unwrap();
        let mut stale = repo.find_by_user_id(&user).unwrap().unwrap();

        let mut winner = repo.find_by_user_id(&user).unwrap().unwrap();
        winner.debit(&ars("100.00")).unwrap();
        repo.update(&mut winner).unwrap();

        stale.debit(&ars("200.00")).unwrap();
        assert!(repo.update(&mut stale).is_err());

        // Reload and retry the way the coordinator does.
        let mut fresh = repo.find_by_user_id(&user).unwrap().unwrap();
        fresh.debit(&ars("200.00")).unwrap();
        repo.update(&mut fresh).unwrap();

        let stored = repo.find_by_user_id(&user).unwrap().unwrap();
        assert_eq!(*stored.balance(), ars("200.00"));
        assert_eq!(stored.version(), 2);
    }
}
