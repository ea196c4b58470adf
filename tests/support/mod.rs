//! Shared harness: the full in-process wiring (stores, topic, queues,
//! consumers, coordinator, gateway simulator) with fast queue timings so
//! scenarios drain in milliseconds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use payflow::app::{
    CreatePaymentRequest, CreatePaymentResponse, CreatePaymentService, GatewayMode,
    GatewaySimulator, PaymentCoordinator,
};
use payflow::bus::{ConsumerThread, InMemoryQueue, InMemoryTopic, Publisher, QueueOptions};
use payflow::domain::{Currency, Money, Payment, PaymentId, UserId, Wallet};
use payflow::error::DomainError;
use payflow::store::{
    InMemoryEventStore, InMemoryIdempotencyStore, InMemoryPaymentRepository,
    InMemoryWalletRepository, PaymentRepository, WalletRepository,
};

pub struct Harness {
    pub payment_repo: Arc<InMemoryPaymentRepository>,
    pub wallet_repo: Arc<InMemoryWalletRepository>,
    pub idempotency: Arc<InMemoryIdempotencyStore>,
    pub event_store: Arc<InMemoryEventStore>,
    pub intake: CreatePaymentService,
    pub payment_queue: InMemoryQueue,
    pub wallet_queue: InMemoryQueue,
    pub gateway_queue: InMemoryQueue,
    consumers: Vec<ConsumerThread>,
}

impl Harness {
    /// Wire the whole system with the given gateway behavior and start
    /// the three consumer threads.
    pub fn start(mode: GatewayMode) -> Self {
        let options = QueueOptions {
            visibility_timeout: Duration::from_millis(50),
            max_receive_count: 3,
            ..QueueOptions::default()
        };

        let topic = InMemoryTopic::new("payment-events");
        let payment_queue = InMemoryQueue::with_options("payment-service-queue", options.clone());
        let wallet_queue = InMemoryQueue::with_options("wallet-service-queue", options.clone());
        let gateway_queue = InMemoryQueue::with_options("external-gateway-queue", options);
        topic.subscribe(&payment_queue);
        topic.subscribe(&wallet_queue);
        topic.subscribe(&gateway_queue);

        let payment_repo = Arc::new(InMemoryPaymentRepository::new());
        let wallet_repo = Arc::new(InMemoryWalletRepository::new());
        let idempotency = Arc::new(InMemoryIdempotencyStore::new());
        let event_store = Arc::new(InMemoryEventStore::new());
        let publisher: Arc<dyn Publisher> = Arc::new(topic.clone());

        let coordinator = Arc::new(PaymentCoordinator::new(
            payment_repo.clone(),
            wallet_repo.clone(),
            event_store.clone(),
            publisher.clone(),
        ));
        let gateway = Arc::new(
            GatewaySimulator::new(event_store.clone(), publisher.clone(), mode)
                .with_timeout(Duration::from_secs(30)),
        );

        let payment_coordinator = coordinator.clone();
        let wallet_coordinator = coordinator.clone();
        let gateway_handler = gateway.clone();
        let consumers = vec![
            ConsumerThread::spawn(payment_queue.clone(), move |event| {
                payment_coordinator.handle_payment_queue_event(event)
            }),
            ConsumerThread::spawn(wallet_queue.clone(), move |event| {
                wallet_coordinator.handle_wallet_queue_event(event)
            }),
            ConsumerThread::spawn(gateway_queue.clone(), move |event| {
                gateway_handler.handle(event)
            }),
        ];

        let intake = CreatePaymentService::new(
            payment_repo.clone(),
            wallet_repo.clone(),
            idempotency.clone(),
            event_store.clone(),
            publisher,
        );

        Harness {
            payment_repo,
            wallet_repo,
            idempotency,
            event_store,
            intake,
            payment_queue,
            wallet_queue,
            gateway_queue,
            consumers,
        }
    }

    pub fn seed_wallet(&self, user: &str, balance: &str) {
        let wallet = Wallet::new(
            UserId::new(user).unwrap(),
            Money::from_str(balance, Currency::ARS).unwrap(),
        )
        .unwrap();
        self.wallet_repo.save(&wallet).unwrap();
    }

    pub fn submit(
        &self,
        user: &str,
        amount: f64,
        key: &str,
    ) -> Result<CreatePaymentResponse, DomainError> {
        self.intake.execute(CreatePaymentRequest {
            user_id: user.to_string(),
            amount,
            currency: "ARS".to_string(),
            service_id: "svc-1".to_string(),
            idempotency_key: key.to_string(),
            client_id: "web".to_string(),
        })
    }

    pub fn balance(&self, user: &str) -> Money {
        *self
            .wallet_repo
            .find_by_user_id(&UserId::new(user).unwrap())
            .unwrap()
            .expect("wallet exists")
            .balance()
    }

    pub fn payment(&self, payment_id: PaymentId) -> Payment {
        self.payment_repo
            .find_by_id(payment_id)
            .unwrap()
            .expect("payment exists")
    }

    pub fn event_types(&self, payment_id: PaymentId) -> Vec<String> {
        self.event_store.event_types(payment_id)
    }

    /// Block until the condition holds or a generous deadline passes.
    pub fn wait_until(&self, what: &str, condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(
                Instant::now() < deadline,
                "timed out waiting for: {}",
                what
            );
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Wait until no queue has anything left to deliver.
    pub fn drain(&self) {
        self.wait_until("bus to drain", || {
            self.payment_queue.pending() == 0
                && self.wallet_queue.pending() == 0
                && self.gateway_queue.pending() == 0
        });
    }

    pub fn shutdown(self) {
        for consumer in self.consumers {
            consumer.stop();
        }
    }
}

pub fn ars(amount: &str) -> Money {
    Money::from_str(amount, Currency::ARS).unwrap()
}
