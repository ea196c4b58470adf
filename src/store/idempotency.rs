use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::StoreError;
use crate::domain::{IdempotencyKey, PaymentId};

/// Maps client-supplied idempotency keys to payment ids.
///
/// Records are written exactly once; `put_if_absent` is first-writer-wins
/// and returns the established binding when the key is already taken, so
/// a racing intake can surface `ALREADY_PROCESSED` instead of failing.
pub trait IdempotencyStore: Send + Sync {
    fn get(&self, key: &IdempotencyKey) -> Result<Option<PaymentId>, StoreError>;

    /// Store `key -> payment_id` unless the key is already bound.
    /// Returns `None` when this call won the write, or `Some(existing)`
    /// with the previously established payment id.
    fn put_if_absent(
        &self,
        key: &IdempotencyKey,
        payment_id: PaymentId,
    ) -> Result<Option<PaymentId>, StoreError>;
}

#[derive(Clone, Default)]
pub struct InMemoryIdempotencyStore {
    keys: Arc<RwLock<HashMap<IdempotencyKey, PaymentId>>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdempotencyStore for InMemoryIdempotencyStore {
    fn get(&self, key: &IdempotencyKey) -> Result<Option<PaymentId>, StoreError> {
        let keys = self
            .keys
            .read()
            .map_err(|_| StoreError::LockPoisoned("idempotency read"))?;
        Ok(keys.get(key).copied())
    }

    fn put_if_absent(
        &self,
        key: &IdempotencyKey,
        payment_id: PaymentId,
    ) -> Result<Option<PaymentId>, StoreError> {
        let mut keys = self
            .keys
            .write()
            .map_err(|_| StoreError::LockPoisoned("idempotency write"))?;
        if let Some(existing) = keys.get(key) {
            return Ok(Some(*existing));
        }
        keys.insert(key.clone(), payment_id);
        Ok(None)
    }
}
