use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::StoreError;
use crate::domain::{Payment, PaymentId};

/// Durable storage of payment aggregates, keyed by payment id.
pub trait PaymentRepository: Send + Sync {
    fn save(&self, payment: &Payment) -> Result<(), StoreError>;
    fn find_by_id(&self, payment_id: PaymentId) -> Result<Option<Payment>, StoreError>;
    fn update(&self, payment: &Payment) -> Result<(), StoreError>;
}

/// In-memory payment store backing the binary and the tests.
#[derive(Clone, Default)]
pub struct InMemoryPaymentRepository {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PaymentRepository for InMemoryPaymentRepository {
    fn save(&self, payment: &Payment) -> Result<(), StoreError> {
        let mut payments = self
            .payments
            .write()
            .map_err(|_| StoreError::LockPoisoned("payment write"))?;
        payments.insert(payment.id(), payment.clone());
        Ok(())
    }

    fn find_by_id(&self, payment_id: PaymentId) -> Result<Option<Payment>, StoreError> {
        let payments = self
            .payments
            .read()
            .map_err(|_| StoreError::LockPoisoned("payment read"))?;
        Ok(payments.get(&payment_id).cloned())
    }

    fn update(&self, payment: &Payment) -> Result<(), StoreError> {
        self.save(payment)
    }
}
