//! Payload types shared by the dispatch tests.

#![allow(dead_code)]

use bus_pool::Message;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Message)]
pub struct FooMessage {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Message)]
pub struct OrderPlaced {
    pub order_id: String,
    pub quantity: u32,
    pub note: Option<String>,
}

impl OrderPlaced {
    pub fn new(order_id: &str, quantity: u32) -> Self {
        Self {
            order_id: order_id.to_string(),
            quantity,
            note: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Message)]
#[message(kind = "weather.forecast-updated")]
pub struct ForecastUpdated {
    pub city: String,
    pub temperature_c: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Message)]
pub struct Unmapped {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Message)]
#[message(kind = "tagged")]
pub struct Tagged<T>(pub T);

pub mod billing {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Message)]
    pub struct Created {
        pub invoice: String,
    }
}

pub mod shipping {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Message)]
    pub struct Created {
        pub parcel: String,
    }
}
