//! Event hooks installed by the server.
//!
//! Push events are currently only logged. A websocket or mobile push transport hooks in here the same way, and must
//! keep to the same rule: a slow or failing delivery is logged and forgotten, never retried into the request path.
use checkout_engine::events::{EventHandlers, EventHooks, OrderPaidEvent, PushEvent, PushEventKind};
use log::*;

pub const EVENT_BUFFER_SIZE: usize = 256;

pub fn create_notification_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_push(|ev| {
        Box::pin(async move {
            log_push_event(&ev);
        })
    });
    hooks.on_order_paid(|ev| {
        Box::pin(async move {
            let OrderPaidEvent { order, payment } = ev;
            info!(
                "📬️ Order {} for user #{} is paid ({} {} via {}). Sending confirmation.",
                order.order_number, order.user_id, payment.amount, payment.currency, payment.gateway
            );
        })
    });
    EventHandlers::new(EVENT_BUFFER_SIZE, hooks)
}

fn log_push_event(ev: &PushEvent) {
    match &ev.kind {
        PushEventKind::CartUpdated { item_count, subtotal } => {
            debug!("📬️ [user #{}] Cart now holds {item_count} items, subtotal {subtotal}", ev.user_id)
        },
        PushEventKind::PaymentUpdated { payment_id, order_number, status } => {
            info!("📬️ [user #{}] Payment {payment_id} for {order_number} is {status}", ev.user_id)
        },
        PushEventKind::OrderUpdated { order_number, status, payment_status } => {
            info!("📬️ [user #{}] Order {order_number} is {status} (paid: {payment_status})", ev.user_id)
        },
    }
}
