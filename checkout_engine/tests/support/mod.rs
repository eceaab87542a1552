#![allow(dead_code)]
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use checkout_engine::{
    db_types::{PaymentMethod, Product, ShippingInfo, UserId},
    events::{EventHandlers, EventHooks, EventProducers, PushEvent, PushEventKind},
    gateway::CustomerInfo,
    objects::PaymentSettings,
    pricing::PricingPolicy,
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path, seed_catalog},
        scripted_gateway::ScriptedGateway,
    },
    traits::{CheckoutDatabase, CheckoutRequest},
    CheckoutFlowApi,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub const ALICE: UserId = 1;
pub const BOB: UserId = 2;

pub struct Fixture {
    pub db: SqliteDatabase,
    pub gateway: ScriptedGateway,
    pub product_a: Product,
    pub product_b: Product,
}

pub async fn setup() -> Fixture {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let (product_a, product_b) = seed_catalog(&db).await;
    Fixture { db, gateway: ScriptedGateway::default(), product_a, product_b }
}

pub async fn tear_down(fixture: Fixture) {
    let url = fixture.db.url().to_string();
    fixture.db.pool().close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not remove test database {url}: {e}");
    }
}

pub fn settings() -> PaymentSettings {
    PaymentSettings { network_backoff: Duration::from_millis(1), ..Default::default() }
}

pub fn flow_api(fixture: &Fixture, producers: EventProducers) -> CheckoutFlowApi<SqliteDatabase, ScriptedGateway> {
    CheckoutFlowApi::new(fixture.db.clone(), fixture.gateway.clone(), PricingPolicy::default(), settings(), producers)
}

pub fn customer() -> CustomerInfo {
    CustomerInfo { email: "alice@example.com".into(), name: "Alice".into(), phone: None }
}

pub fn lekki_checkout(payment_method: PaymentMethod) -> CheckoutRequest {
    CheckoutRequest {
        shipping: ShippingInfo {
            address: "12 Admiralty Way".into(),
            city: "Lekki".into(),
            state: "Lagos Island".into(),
            country: "Nigeria".into(),
            zip_code: "106104".into(),
        },
        payment_method,
        customer_phone: Some("+2348000000000".into()),
        notes: None,
    }
}

/// Counts and records the events published through the hooks it installs.
#[derive(Clone, Default)]
pub struct EventLog {
    pub order_paid: Arc<AtomicUsize>,
    pub pushes: Arc<Mutex<Vec<PushEvent>>>,
}

impl EventLog {
    pub async fn start(&self) -> EventProducers {
        let mut hooks = EventHooks::default();
        let paid = self.order_paid.clone();
        hooks.on_order_paid(move |ev| {
            info!("🪝️ Order {} paid", ev.order.order_number);
            paid.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let pushes = self.pushes.clone();
        hooks.on_push(move |ev| {
            pushes.lock().unwrap().push(ev);
            Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let handlers = EventHandlers::new(64, hooks);
        let producers = handlers.producers();
        handlers.start_handlers().await;
        producers
    }

    /// Gives the handlers a moment to drain their queues.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    pub fn order_paid_count(&self) -> usize {
        self.order_paid.load(Ordering::SeqCst)
    }

    pub fn cart_updates_for(&self, user_id: UserId) -> usize {
        self.pushes
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id && matches!(e.kind, PushEventKind::CartUpdated { .. }))
            .count()
    }

    pub fn payment_updates(&self) -> Vec<PushEvent> {
        self.pushes
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e.kind, PushEventKind::PaymentUpdated { .. }))
            .cloned()
            .collect()
    }
}
