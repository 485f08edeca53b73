use bus_pool::{
    ConnectionConfig, Credential, Destination, DestinationKind, DispatchPool, InMemoryConnection,
    Message, PoolConfig, ReceiveMode, RetryPolicy, TransportMode,
};
use serde::Serialize;

#[derive(Serialize, Message)]
#[message(kind = "OrderPlaced")]
struct OrderPlaced {
    order_id: String,
}

#[derive(Serialize, Message)]
#[message(kind = "weather.forecast-updated")]
struct ForecastUpdated {
    city: String,
}

const DOCUMENT: &str = r#"{
    "connection": {
        "endpoint": "sb://contoso.servicebus.windows.net/",
        "transport": "amqp_web_sockets"
    },
    "destinations": {
        "queues": {
            "OrderPlaced": {
                "path": "orders",
                "receive_mode": "receive_and_delete",
                "retry_policy": { "type": "no_retry" }
            }
        },
        "topics": {
            "weather.forecast-updated": { "path": "forecasts" }
        }
    }
}"#;

#[test]
fn pool_from_document_routes_by_kind_tag() {
    let config = PoolConfig::from_json(DOCUMENT).unwrap();
    let connection = InMemoryConnection::from_config(config.connection.clone());
    let pool = DispatchPool::from_config(connection.clone(), &config.destinations);

    pool.queue()
        .send(&OrderPlaced {
            order_id: "o-1".into(),
        })
        .unwrap();
    pool.topic()
        .send(&ForecastUpdated {
            city: "Oslo".into(),
        })
        .unwrap();

    assert_eq!(connection.entity("orders").bodies(), vec![r#"{"order_id":"o-1"}"#]);
    assert_eq!(connection.entity("forecasts").bodies(), vec![r#"{"city":"Oslo"}"#]);
    assert_eq!(
        connection.config().map(|c| c.transport),
        Some(TransportMode::AmqpWebSockets)
    );
}

#[test]
fn binding_options_reach_the_connection() {
    let config = PoolConfig::from_json(DOCUMENT).unwrap();
    let connection = InMemoryConnection::new();
    let _pool = DispatchPool::from_config(connection.clone(), &config.destinations);

    let opened = connection.opened();
    let orders = opened
        .iter()
        .find(|o| o.destination == DestinationKind::Queue)
        .unwrap();
    assert_eq!(orders.path, "orders");
    assert_eq!(orders.receive_mode, Some(ReceiveMode::ReceiveAndDelete));
    assert_eq!(orders.retry_policy, RetryPolicy::NoRetry);

    let forecasts = opened
        .iter()
        .find(|o| o.destination == DestinationKind::Topic)
        .unwrap();
    assert_eq!(forecasts.path, "forecasts");
    assert_eq!(forecasts.retry_policy, RetryPolicy::default());
}

#[test]
fn code_registrations_override_document() {
    let config = PoolConfig::from_json(DOCUMENT).unwrap();
    let pool = DispatchPool::configure(InMemoryConnection::new(), |pool| {
        pool.configure(&config.destinations)
            .add_queue::<OrderPlaced>("orders-v2");
    });

    assert_eq!(pool.queue_client::<OrderPlaced>().unwrap().path(), "orders-v2");
    assert_eq!(pool.queues().len(), 1);
    assert_eq!(pool.topics().len(), 1);
}

#[test]
fn managed_identity_namespace_expands_to_endpoint() {
    let config = ConnectionConfig::managed_identity("contoso");

    assert_eq!(config.host(), "contoso.servicebus.windows.net");
    assert_eq!(config.credential, Credential::ManagedIdentity);
}

#[test]
fn connection_string_round_trips_through_serde() {
    let config = ConnectionConfig::from_connection_string(
        "Endpoint=sb://contoso.servicebus.windows.net/;SharedAccessKeyName=RootManageSharedAccessKey;SharedAccessKey=secret",
    )
    .unwrap();

    let json = serde_json::to_string(&config).unwrap();
    let back: ConnectionConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}
