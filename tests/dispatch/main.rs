mod messages;

use std::sync::Arc;

#[cfg(feature = "emitter")]
use bus_pool::EmitterTopic;
use bus_pool::{
    Destination, DestinationKind, DispatchError, DispatchPool, Envelope,
    InMemoryConnection, InMemoryEntity, Message, MessageKind, ReceiveMode, Subscription,
    SubscriptionOptions, TransportError,
};
use chrono::{Duration, Utc};
use messages::{billing, shipping, FooMessage, ForecastUpdated, OrderPlaced, Tagged, Unmapped};

fn order_pool(connection: &InMemoryConnection) -> DispatchPool<InMemoryConnection> {
    DispatchPool::configure(connection.clone(), |pool| {
        pool.add_queue::<FooMessage>("orders")
            .add_queue::<OrderPlaced>("orders")
            .add_topic::<ForecastUpdated>("forecasts");
    })
}

// ============================================================================
// Message kinds
// ============================================================================

#[test]
fn derive_defaults_to_module_qualified_name() {
    assert_eq!(FooMessage::KIND, concat!(module_path!(), "::messages::FooMessage"));
    assert_eq!(OrderPlaced::kind(), MessageKind::from(OrderPlaced::KIND));
}

#[test]
fn same_named_types_get_distinct_kinds() {
    assert_ne!(billing::Created::KIND, shipping::Created::KIND);
    assert!(billing::Created::KIND.ends_with("billing::Created"));
    assert!(shipping::Created::KIND.ends_with("shipping::Created"));
}

#[test]
fn same_named_type_from_another_module_is_unmapped() {
    let connection = InMemoryConnection::new();
    let pool = DispatchPool::configure(connection.clone(), |pool| {
        pool.add_queue::<billing::Created>("invoices");
    });

    pool.queue()
        .send(&billing::Created {
            invoice: "i-1".into(),
        })
        .unwrap();
    let err = pool
        .queue()
        .send(&shipping::Created {
            parcel: "p-1".into(),
        })
        .unwrap_err();

    assert!(matches!(err, DispatchError::UnmappedMessageKind { .. }));
    assert_eq!(connection.entity("invoices").bodies(), vec![r#"{"invoice":"i-1"}"#]);
}

#[test]
fn generic_instantiations_carry_their_declared_kinds() {
    let connection = InMemoryConnection::new();
    let pool = DispatchPool::configure(connection.clone(), |pool| {
        pool.add_queue::<Tagged<u8>>("bytes");
    });

    assert_eq!(Tagged::<u8>::KIND, "tagged");
    pool.queue().send(&Tagged(7u8)).unwrap();
    assert_eq!(connection.entity("bytes").bodies(), vec!["7"]);
}

#[test]
fn derive_honours_kind_override() {
    assert_eq!(ForecastUpdated::KIND, "weather.forecast-updated");
    assert_eq!(MessageKind::of::<ForecastUpdated>().as_str(), "weather.forecast-updated");
}

// ============================================================================
// Sending
// ============================================================================

#[test]
fn empty_payload_reaches_its_queue_once() {
    let connection = InMemoryConnection::new();
    let pool = order_pool(&connection);

    pool.queue().send(&FooMessage {}).unwrap();

    let orders = connection.entity("orders");
    assert_eq!(orders.bodies(), vec!["{}"]);
    assert_eq!(orders.kinds(), vec![FooMessage::KIND]);
    assert!(connection.entity("forecasts").is_empty());
}

#[test]
fn bodies_are_compact_and_skip_nulls() {
    let connection = InMemoryConnection::new();
    let pool = order_pool(&connection);

    pool.queue().send(&OrderPlaced::new("o-1", 2)).unwrap();

    let envelope = connection.entity("orders").find_by_kind(OrderPlaced::KIND).unwrap();
    assert_eq!(envelope.body_str(), Some(r#"{"order_id":"o-1","quantity":2}"#));
    assert_eq!(envelope.content_type(), "application/json");

    let decoded: OrderPlaced = envelope.decode().unwrap().unwrap();
    assert_eq!(decoded, OrderPlaced::new("o-1", 2));
}

#[test]
fn batch_preserves_input_order() {
    let connection = InMemoryConnection::new();
    let pool = order_pool(&connection);

    let batch = vec![
        OrderPlaced::new("o-1", 1),
        OrderPlaced::new("o-2", 2),
        OrderPlaced::new("o-3", 3),
    ];
    pool.queue().send_all(&batch).unwrap();

    let received: Vec<OrderPlaced> = connection
        .entity("orders")
        .messages()
        .iter()
        .map(|e| e.decode().unwrap().unwrap())
        .collect();
    assert_eq!(received, batch);
}

#[test]
fn unmapped_message_is_rejected_before_sending() {
    let connection = InMemoryConnection::new();
    let pool = order_pool(&connection);

    let err = pool.queue().send(&Unmapped { id: 9 }).unwrap_err();

    assert_eq!(
        err.to_string(),
        format!(
            "there is no queue client registered for the message kind {}",
            Unmapped::KIND
        )
    );
    assert!(connection.entity("orders").is_empty());
}

#[test]
fn mixed_batch_with_unmapped_kind_sends_nothing() {
    let connection = InMemoryConnection::new();
    let pool = order_pool(&connection);

    let batch = vec![
        Envelope::encode(&OrderPlaced::new("o-1", 1)).unwrap(),
        Envelope::encode(&FooMessage {}).unwrap(),
        Envelope::encode(&Unmapped { id: 1 }).unwrap(),
        Envelope::encode(&OrderPlaced::new("o-2", 1)).unwrap(),
    ];

    let err = pool.queue().send_envelopes(&batch).unwrap_err();
    match err {
        DispatchError::UnmappedMessageKind { kind, destination } => {
            assert_eq!(kind.as_str(), Unmapped::KIND);
            assert_eq!(destination, DestinationKind::Queue);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(connection.entity("orders").is_empty());
}

#[test]
fn queue_mapping_does_not_leak_into_topics() {
    let connection = InMemoryConnection::new();
    let pool = order_pool(&connection);

    let err = pool.topic().send(&OrderPlaced::new("o-1", 1)).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::UnmappedMessageKind {
            destination: DestinationKind::Topic,
            ..
        }
    ));

    let err = pool
        .queue()
        .send(&ForecastUpdated {
            city: "Oslo".into(),
            temperature_c: -4,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::UnmappedMessageKind {
            destination: DestinationKind::Queue,
            ..
        }
    ));
}

#[test]
fn mixed_envelopes_route_to_their_own_destinations() {
    let connection = InMemoryConnection::new();
    let pool = DispatchPool::configure(connection.clone(), |pool| {
        pool.add_queue::<FooMessage>("foo")
            .add_queue::<OrderPlaced>("orders");
    });

    let batch = vec![
        Envelope::encode(&OrderPlaced::new("o-1", 1)).unwrap(),
        Envelope::encode(&FooMessage {}).unwrap(),
        Envelope::encode(&OrderPlaced::new("o-2", 1)).unwrap(),
    ];
    pool.queue().send_envelopes(&batch).unwrap();

    assert_eq!(connection.entity("orders").len(), 2);
    assert_eq!(connection.entity("foo").len(), 1);
}

#[test]
fn pass_through_envelope_keeps_metadata() {
    let connection = InMemoryConnection::new();
    let pool = order_pool(&connection);

    let envelope = Envelope::from_bytes(OrderPlaced::kind(), br#"{"order_id":"o-7","quantity":1}"#.to_vec())
        .with_message_id("m-7")
        .with_correlation_id("c-1")
        .with_property("tenant", "acme");
    pool.queue().send_envelope(&envelope).unwrap();

    let stored = connection.entity("orders").messages().remove(0);
    assert_eq!(stored.message_id(), Some("m-7"));
    assert_eq!(stored.correlation_id(), Some("c-1"));
    assert_eq!(stored.property("tenant"), Some("acme"));
}

#[test]
fn transport_failure_stops_the_batch() {
    let connection = InMemoryConnection::new();
    let pool = order_pool(&connection);
    let orders = connection.entity("orders");
    orders.fail_after(1);

    let batch = vec![
        OrderPlaced::new("o-1", 1),
        OrderPlaced::new("o-2", 1),
        OrderPlaced::new("o-3", 1),
    ];
    let err = pool.queue().send_all(&batch).unwrap_err();

    assert!(err.is_transport());
    assert!(err.kind().is_none());
    assert_eq!(orders.len(), 1);

    orders.recover();
    pool.queue().send_all(&batch[1..]).unwrap();
    assert_eq!(orders.len(), 3);
}

// ============================================================================
// Scheduling
// ============================================================================

#[test]
fn scheduled_messages_wait_for_their_time() {
    let connection = InMemoryConnection::new();
    let pool = order_pool(&connection);
    let orders = connection.entity("orders");
    let at = Utc::now() + Duration::minutes(10);

    let sequence = pool.queue().schedule(&OrderPlaced::new("o-1", 1), at).unwrap();

    assert!(orders.is_empty());
    assert_eq!(orders.scheduled()[0].sequence, sequence);
    assert_eq!(orders.release_due(Utc::now()), 0);
    assert_eq!(orders.release_due(at), 1);
    assert_eq!(orders.kinds(), vec![OrderPlaced::KIND]);
}

#[test]
fn scheduled_batch_returns_one_sequence_per_message() {
    let connection = InMemoryConnection::new();
    let pool = order_pool(&connection);
    let at = Utc::now() + Duration::hours(1);

    let sequences = pool
        .topic()
        .schedule_all(
            &[
                ForecastUpdated {
                    city: "Oslo".into(),
                    temperature_c: -4,
                },
                ForecastUpdated {
                    city: "Bergen".into(),
                    temperature_c: 6,
                },
            ],
            at,
        )
        .unwrap();

    assert_eq!(sequences.len(), 2);
    let scheduled = connection.entity("forecasts").scheduled();
    let scheduled_sequences: Vec<_> = scheduled.iter().map(|m| m.sequence).collect();
    assert_eq!(scheduled_sequences, sequences);
}

#[test]
fn cancelled_message_is_never_delivered() {
    let connection = InMemoryConnection::new();
    let pool = order_pool(&connection);
    let at = Utc::now();

    let sequence = pool.queue().schedule(&FooMessage {}, at).unwrap();
    pool.queue().cancel_scheduled::<FooMessage>(sequence).unwrap();

    let orders = connection.entity("orders");
    assert_eq!(orders.release_due(at), 0);
    assert!(orders.is_empty());

    let err = pool
        .queue()
        .cancel_scheduled::<FooMessage>(sequence)
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Transport(TransportError::NotFound(_))
    ));
}

#[test]
fn scheduling_unmapped_envelope_batch_schedules_nothing() {
    let connection = InMemoryConnection::new();
    let pool = order_pool(&connection);

    let batch = vec![
        Envelope::encode(&FooMessage {}).unwrap(),
        Envelope::encode(&Unmapped { id: 3 }).unwrap(),
    ];
    let err = pool
        .queue()
        .schedule_envelopes(&batch, Utc::now())
        .unwrap_err();

    assert_eq!(err.kind().map(MessageKind::as_str), Some(Unmapped::KIND));
    assert!(connection.entity("orders").scheduled().is_empty());
}

// ============================================================================
// Clients and subscriptions
// ============================================================================

#[test]
fn clients_resolve_per_destination_kind() {
    let connection = InMemoryConnection::new();
    let pool = order_pool(&connection);

    assert_eq!(pool.queue_client::<OrderPlaced>().unwrap().path(), "orders");
    assert_eq!(pool.topic_client::<ForecastUpdated>().unwrap().path(), "forecasts");
    assert!(pool.queue().is_mapped::<FooMessage>());
    assert!(!pool.topic().is_mapped::<FooMessage>());

    let err = pool.queue_client::<ForecastUpdated>().err().unwrap();
    assert_eq!(
        err.to_string(),
        "queue has not been registered for the message kind weather.forecast-updated"
    );
}

#[test]
fn topic_subscription_binds_topic_and_name() {
    let connection = InMemoryConnection::new();
    let pool = DispatchPool::configure(connection.clone(), |pool| {
        pool.add_topic::<FooMessage>("t1");
    });

    let first = pool
        .topic_subscription::<FooMessage>("sub1", &SubscriptionOptions::default())
        .unwrap();
    let second = pool
        .topic_subscription::<FooMessage>("sub1", &SubscriptionOptions::receive_and_delete())
        .unwrap();

    assert_eq!((first.topic_path(), first.name()), ("t1", "sub1"));
    assert_eq!((second.topic_path(), second.name()), ("t1", "sub1"));
    assert_eq!(first.options().receive_mode, ReceiveMode::PeekLock);
    assert_eq!(second.options().receive_mode, ReceiveMode::ReceiveAndDelete);
}

#[test]
fn topic_subscription_requires_registered_topic() {
    let pool = DispatchPool::configure(InMemoryConnection::new(), |pool| {
        pool.add_queue::<FooMessage>("orders");
    });

    let err = pool
        .topic_subscription::<FooMessage>("sub1", &SubscriptionOptions::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        DispatchError::UnregisteredDestination {
            destination: DestinationKind::Topic,
            ..
        }
    ));
}

#[test]
fn subscribers_receive_published_messages() {
    let connection = InMemoryConnection::new();
    let pool = order_pool(&connection);

    let audit = pool
        .topic_subscription::<ForecastUpdated>("audit", &SubscriptionOptions::default())
        .unwrap();
    let alerts = pool
        .topic_subscription::<ForecastUpdated>("alerts", &SubscriptionOptions::default())
        .unwrap();

    pool.topic()
        .send(&ForecastUpdated {
            city: "Oslo".into(),
            temperature_c: -4,
        })
        .unwrap();

    let seen = audit.receive(100).unwrap().unwrap();
    let forecast: ForecastUpdated = seen.envelope.decode().unwrap().unwrap();
    assert_eq!(forecast.city, "Oslo");
    assert_eq!(seen.delivery_count, 1);
    audit.complete(seen.sequence).unwrap();

    // Each subscription gets its own copy
    assert!(alerts.receive(100).unwrap().is_some());
    assert_eq!(connection.completed("forecasts", "audit"), vec![seen.sequence]);
}

#[test]
fn subscription_sees_sends_to_adopted_topic_client() {
    let connection = InMemoryConnection::new();
    let t1 = InMemoryEntity::new("t1");
    connection.adopt(&t1);
    let pool = DispatchPool::configure(connection.clone(), |pool| {
        pool.add_topic_client::<FooMessage>(Arc::new(t1.clone()));
    });

    let sub = pool
        .topic_subscription::<FooMessage>("sub1", &SubscriptionOptions::default())
        .unwrap();
    pool.topic().send(&FooMessage {}).unwrap();

    assert_eq!(t1.len(), 1);
    let received = sub.receive(100).unwrap().unwrap();
    assert_eq!(received.envelope.kind().as_str(), FooMessage::KIND);
}

#[test]
fn subscription_sees_sends_to_connection_entity_client() {
    let connection = InMemoryConnection::new();
    let pool = DispatchPool::configure(connection.clone(), |pool| {
        pool.add_topic_client::<FooMessage>(Arc::new(connection.entity("t1")));
    });

    let sub = pool
        .topic_subscription::<FooMessage>("sub1", &SubscriptionOptions::default())
        .unwrap();
    pool.topic().send(&FooMessage {}).unwrap();

    assert!(sub.receive(100).unwrap().is_some());
}

#[test]
fn abandoned_message_is_redelivered() {
    let connection = InMemoryConnection::new();
    let pool = order_pool(&connection);
    let worker = pool
        .topic_subscription::<ForecastUpdated>("worker", &SubscriptionOptions::default())
        .unwrap();

    pool.topic()
        .send(&ForecastUpdated {
            city: "Tromsø".into(),
            temperature_c: -12,
        })
        .unwrap();

    let first = worker.receive(100).unwrap().unwrap();
    worker.abandon(first.sequence, "downstream unavailable").unwrap();

    let again = worker.receive(100).unwrap().unwrap();
    assert_eq!(again.sequence, first.sequence);
    assert_eq!(again.delivery_count, 2);
}

// ============================================================================
// Transports
// ============================================================================

#[test]
fn prebuilt_clients_share_state_with_the_caller() {
    let orders = InMemoryEntity::new("orders");
    let pool = DispatchPool::configure(InMemoryConnection::new(), |pool| {
        pool.add_queue_client::<OrderPlaced>(Arc::new(orders.clone()));
    });

    pool.queue().send(&OrderPlaced::new("o-1", 1)).unwrap();

    assert_eq!(orders.len(), 1);
    assert!(pool.connection().opened().is_empty());
}

#[cfg(feature = "emitter")]
#[test]
fn emitter_topic_fans_out_to_listeners() {
    use std::sync::mpsc;
    use std::time::Duration as StdDuration;

    let topic = Arc::new(EmitterTopic::new("forecasts"));
    let (tx, rx) = mpsc::channel();
    topic.on(move |body: String| {
        tx.send(body).unwrap();
    });

    let pool = DispatchPool::configure(InMemoryConnection::new(), |pool| {
        pool.add_topic_client::<ForecastUpdated>(topic.clone());
    });

    pool.topic()
        .send(&ForecastUpdated {
            city: "Oslo".into(),
            temperature_c: -4,
        })
        .unwrap();

    let body = rx
        .recv_timeout(StdDuration::from_secs(1))
        .expect("listener never fired");
    assert_eq!(body, r#"{"city":"Oslo","temperature_c":-4}"#);

    let err = pool
        .topic()
        .schedule(
            &ForecastUpdated {
                city: "Oslo".into(),
                temperature_c: -4,
            },
            Utc::now(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Transport(TransportError::Rejected(_))
    ));
}

#[test]
fn pool_is_shareable_across_threads() {
    let connection = InMemoryConnection::new();
    let pool = Arc::new(order_pool(&connection));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                pool.queue()
                    .send(&OrderPlaced::new(&format!("o-{i}"), i))
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(connection.entity("orders").len(), 4);
}
