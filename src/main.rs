//! Service entry point: wires the in-memory stores, the topic and its
//! three queues, the saga coordinator, the gateway simulator, and the
//! HTTP intake.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use payflow::app::{CreatePaymentService, GatewayMode, GatewaySimulator, PaymentCoordinator};
use payflow::bus::{ConsumerThread, InMemoryQueue, InMemoryTopic, Publisher};
use payflow::config::Config;
use payflow::store::{
    InMemoryEventStore, InMemoryIdempotencyStore, InMemoryPaymentRepository,
    InMemoryWalletRepository,
};
use payflow::http;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!("configuration loaded");

    // One topic fans out to the three queues; each queue processes only
    // the event types it recognizes.
    let topic = InMemoryTopic::new(&config.topic_name);
    let payment_queue = InMemoryQueue::with_options(&config.payment_queue, config.queue_options());
    let wallet_queue = InMemoryQueue::with_options(&config.wallet_queue, config.queue_options());
    let gateway_queue =
        InMemoryQueue::with_options(&config.external_gateway_queue, config.queue_options());
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

    let gateway = Arc::new(GatewaySimulator::new(
        event_store.clone(),
        publisher.clone(),
        GatewayMode::parse(&config.gateway_mode)?,
    ));

    // Payment queue: payment lifecycle events.
    let payment_coordinator = coordinator.clone();
    let payment_consumer = ConsumerThread::spawn(payment_queue, move |event| {
        payment_coordinator.handle_payment_queue_event(event)
    });

    // Wallet queue: compensation requests.
    let wallet_coordinator = coordinator.clone();
    let wallet_consumer = ConsumerThread::spawn(wallet_queue, move |event| {
        wallet_coordinator.handle_wallet_queue_event(event)
    });

    // External gateway queue: simulated gateway processing.
    let gateway_handler = gateway.clone();
    let gateway_consumer =
        ConsumerThread::spawn(gateway_queue, move |event| gateway_handler.handle(event));

    let intake = Arc::new(CreatePaymentService::new(
        payment_repo,
        wallet_repo,
        idempotency,
        event_store,
        publisher,
    ));

    let addr = format!("0.0.0.0:{}", config.server_port);
    tokio::select! {
        result = http::serve(intake, &addr) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    // Consumers stop without acking in-flight messages; anything mid-
    // handler becomes visible again after its timeout.
    payment_consumer.stop();
    wallet_consumer.stop();
    gateway_consumer.stop();
    tracing::info!("consumers drained, goodbye");

    Ok(())
}
