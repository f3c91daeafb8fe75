#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;
use forge_protocol::Event;

fn msg_created(session_id: &str) -> Event {
    Event::TaskStarted {
        session_id: session_id.to_string(),
        task_id: "task_1".to_string(),
    }
}

#[tokio::test]
async fn publish_with_no_subscribers_is_noop() {
    let bus = BroadcastBus::new();
    bus.publish(msg_created("ses_a")).await;
}

#[tokio::test]
async fn filtered_subscriber_receives_only_matching_session() {
    let bus = BroadcastBus::new();
    let mut sub = bus.subscribe(Some("ses_a".to_string())).await;

    bus.publish(msg_created("ses_b")).await;
    bus.publish(msg_created("ses_a")).await;

    let event = sub.recv().await.unwrap();
    match event {
        Event::TaskStarted { session_id, .. } => assert_eq!(session_id, "ses_a"),
        _ => panic!("unexpected event"),
    }
}

#[tokio::test]
async fn unfiltered_subscriber_receives_every_session() {
    let bus = BroadcastBus::new();
    let mut sub = bus.subscribe(None).await;

    bus.publish(msg_created("ses_a")).await;
    bus.publish(msg_created("ses_b")).await;

    assert!(sub.recv().await.is_some());
    assert!(sub.recv().await.is_some());
}

#[tokio::test]
async fn delivery_order_matches_publish_order() {
    let bus = BroadcastBus::new();
    let mut sub = bus.subscribe(None).await;

    for i in 0..10 {
        bus.publish(Event::TaskStarted {
            session_id: "ses_a".to_string(),
            task_id: format!("task_{i}"),
        })
        .await;
    }

    for i in 0..10 {
        let event = sub.recv().await.unwrap();
        match event {
            Event::TaskStarted { task_id, .. } => assert_eq!(task_id, format!("task_{i}")),
            _ => panic!("unexpected event"),
        }
    }
}

#[tokio::test]
async fn cancelled_subscription_stops_delivery() {
    let bus = BroadcastBus::new();
    let sub = bus.subscribe(None).await;
    sub.cancel().await;
    assert_eq!(bus.subscriber_count().await, 0);

    // Publishing after cancellation must not fail or panic.
    bus.publish(msg_created("ses_a")).await;
}

#[tokio::test]
async fn error_event_without_session_id_not_delivered_to_filtered_subscriber() {
    let bus = BroadcastBus::new();
    let mut sub = bus.subscribe(Some("ses_a".to_string())).await;

    bus.publish(Event::Error {
        session_id: None,
        message: "oops".to_string(),
    })
    .await;
    bus.publish(msg_created("ses_a")).await;

    let event = sub.recv().await.unwrap();
    assert!(matches!(event, Event::TaskStarted { .. }));
}

#[tokio::test]
async fn many_subscribers_observe_a_burst_in_order() {
    let bus = BroadcastBus::new();
    let mut subs: Vec<Subscription> = Vec::new();
    for _ in 0..10 {
        subs.push(bus.subscribe(None).await);
    }

    for i in 0..10 {
        bus.publish(Event::TaskStarted {
            session_id: "ses_a".to_string(),
            task_id: format!("task_{i}"),
        })
        .await;
    }

    for sub in subs.iter_mut() {
        for i in 0..10 {
            let event = sub.recv().await.unwrap();
            match event {
                Event::TaskStarted { task_id, .. } => assert_eq!(task_id, format!("task_{i}")),
                _ => panic!("unexpected event"),
            }
        }
    }
}

#[tokio::test]
async fn null_bus_publish_is_noop_and_subscription_is_closed() {
    let bus = NullBus::new();
    bus.publish(msg_created("ses_a")).await;
    let mut sub = bus.subscribe(None).await;
    assert!(sub.recv().await.is_none());
}

#[tokio::test]
async fn full_queue_blocks_publisher_until_drained() {
    let bus = BroadcastBus::with_capacity(2);
    let mut sub = bus.subscribe(None).await;

    bus.publish(msg_created("ses_a")).await;
    bus.publish(msg_created("ses_a")).await;

    // Queue is now full (capacity 2); spawn a task that will drain it after
    // a short delay so this publish can complete.
    let drain = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        sub.recv().await
    });

    tokio::time::timeout(std::time::Duration::from_secs(1), bus.publish(msg_created("ses_a")))
        .await
        .expect("publish should unblock once the subscriber drains");

    drain.await.unwrap();
}
