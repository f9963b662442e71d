use super::*;
use crate::catalog::CatalogService;
use crate::utils::time::ManualClock;
use rust_decimal::Decimal;
use shared::models::ServiceCreate;
use tokio::sync::mpsc;

mod test_escalation;

// 2026-02-20T09:00:00Z
const OPEN: i64 = 1_771_578_000_000;
const DAY_MS: i64 = 86_400_000;
const TODAY: &str = "2026-02-20";

struct Harness {
    manager: QueueManager,
    clock: Arc<ManualClock>,
    catalog: CatalogService,
    notifications: mpsc::Receiver<Notification>,
}

impl Harness {
    /// Drain every notification enqueued so far
    fn drain(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            out.push(n);
        }
        out
    }

    fn add_service(&self, name: &str, price: i64) -> u64 {
        self.catalog
            .create(ServiceCreate {
                name: name.to_string(),
                price: Decimal::from(price),
            })
            .unwrap()
            .id
    }
}

fn create_harness() -> Harness {
    let storage = QueueStorage::open_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(OPEN));
    let catalog = CatalogService::new(storage.clone());
    let (queue, notifications) = NotificationQueue::channel(64);
    let manager = QueueManager::new(
        storage,
        clock.clone(),
        Arc::new(catalog.clone()),
        queue,
        20,
    );
    Harness {
        manager,
        clock,
        catalog,
        notifications,
    }
}

fn request(name: &str, phone: &str) -> RegisterRequest {
    RegisterRequest {
        name: name.to_string(),
        phone: phone.to_string(),
        requested_staff_id: None,
    }
}

fn register(h: &Harness, name: &str, phone: &str) -> Ticket {
    h.manager.register_client(request(name, phone)).unwrap()
}

fn barber() -> Caller {
    Caller::staff(10, "Luis")
}

fn admin() -> Caller {
    Caller::admin(1, "Admin")
}

fn kinds_for(notifications: &[Notification], phone: &str) -> Vec<NotificationKind> {
    notifications
        .iter()
        .filter(|n| n.phone == phone)
        .map(|n| n.kind)
        .collect()
}
