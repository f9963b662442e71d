use super::*;

fn level_of(h: &Harness, id: u64) -> EscalationLevel {
    h.manager.get_ticket(id).unwrap().escalation_level
}

#[test]
fn test_first_in_line_notified_once() {
    let mut h = create_harness();
    let a = register(&h, "A", "111");
    assert_eq!(a.escalation_level, EscalationLevel::NextInLine);

    let b = register(&h, "B", "222");
    assert_eq!(b.escalation_level, EscalationLevel::None);

    assert_eq!(h.manager.run_escalation().unwrap(), 0);
    assert_eq!(h.manager.run_escalation().unwrap(), 0);

    let sent = h.drain();
    assert_eq!(kinds_for(&sent, "111"), vec![NotificationKind::NextInLine]);
    assert!(kinds_for(&sent, "222").is_empty());
}

#[test]
fn test_call_promotes_next_client() {
    let mut h = create_harness();
    register(&h, "A", "111");
    let b = register(&h, "B", "222");
    h.drain();

    h.manager.call_next(&barber()).unwrap();
    assert_eq!(level_of(&h, b.id), EscalationLevel::NextInLine);

    let sent = h.drain();
    let turn_called = sent
        .iter()
        .find(|n| n.kind == NotificationKind::TurnCalled)
        .unwrap();
    assert_eq!(turn_called.phone, "111");
    assert_eq!(turn_called.daily_sequence, 1);
    assert_eq!(turn_called.extra.as_deref(), Some("Luis"));
    assert_eq!(kinds_for(&sent, "222"), vec![NotificationKind::NextInLine]);
}

#[test]
fn test_second_in_line_waits_for_threshold() {
    let mut h = create_harness();
    let a = register(&h, "A", "111");
    let b = register(&h, "B", "222");
    let c = register(&h, "C", "333");

    h.manager.call_next(&barber()).unwrap();
    h.manager.seat(&barber(), a.id).unwrap();
    assert_eq!(level_of(&h, b.id), EscalationLevel::NextInLine);
    assert_eq!(level_of(&h, c.id), EscalationLevel::None);
    h.drain();

    h.clock.advance_minutes(19);
    assert_eq!(h.manager.run_escalation().unwrap(), 0);
    assert_eq!(level_of(&h, c.id), EscalationLevel::None);

    h.clock.advance_minutes(1);
    assert_eq!(h.manager.run_escalation().unwrap(), 1);
    assert_eq!(level_of(&h, c.id), EscalationLevel::Approaching);
    assert_eq!(kinds_for(&h.drain(), "333"), vec![NotificationKind::Approaching]);

    // Already recorded, never re-sent
    h.clock.advance_minutes(30);
    assert_eq!(h.manager.run_escalation().unwrap(), 0);
    assert!(h.drain().is_empty());
}

#[test]
fn test_second_in_line_never_notified_without_chair() {
    let mut h = create_harness();
    register(&h, "A", "111");
    let b = register(&h, "B", "222");

    // A called but never seated: no InChair ticket
    h.manager.call_next(&barber()).unwrap();
    register(&h, "C", "333");
    h.drain();

    h.clock.advance_minutes(120);
    h.manager.run_escalation().unwrap();
    assert_eq!(level_of(&h, b.id), EscalationLevel::NextInLine);
    assert!(kinds_for(&h.drain(), "333").is_empty());
}

#[test]
fn test_escalation_is_monotonic() {
    let mut h = create_harness();
    let a = register(&h, "A", "111");
    register(&h, "B", "222");
    let c = register(&h, "C", "333");

    h.manager.call_next(&barber()).unwrap();
    h.manager.seat(&barber(), a.id).unwrap();
    h.clock.advance_minutes(25);
    h.manager.run_escalation().unwrap();
    assert_eq!(level_of(&h, c.id), EscalationLevel::Approaching);

    // C moves up to first in line
    h.manager.call_next(&barber()).unwrap();
    assert_eq!(level_of(&h, c.id), EscalationLevel::NextInLine);

    // A newcomer never pulls earlier levels down
    register(&h, "D", "444");
    h.manager.run_escalation().unwrap();
    assert_eq!(level_of(&h, c.id), EscalationLevel::NextInLine);

    let sent = h.drain();
    assert_eq!(
        kinds_for(&sent, "333"),
        vec![NotificationKind::Approaching, NotificationKind::NextInLine]
    );
}

#[test]
fn test_cancel_of_first_promotes_second() {
    let mut h = create_harness();
    register(&h, "A", "111");
    let b = register(&h, "B", "222");
    h.drain();

    h.manager.cancel_by_phone("111").unwrap();
    assert_eq!(level_of(&h, b.id), EscalationLevel::NextInLine);
    assert_eq!(kinds_for(&h.drain(), "222"), vec![NotificationKind::NextInLine]);
}

#[test]
fn test_full_notification_queue_does_not_fail_operation() {
    let storage = QueueStorage::open_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(OPEN));
    let catalog = Arc::new(CatalogService::new(storage.clone()));
    let (queue, _rx) = NotificationQueue::channel(1);
    let manager = QueueManager::new(storage, clock, catalog, queue, 20);

    manager.register_client(request("A", "111")).unwrap();
    manager.call_next(&barber()).unwrap();
    let b = manager.register_client(request("B", "222")).unwrap();

    // Level recorded even though the notification was dropped
    assert_eq!(b.escalation_level, EscalationLevel::NextInLine);
}
