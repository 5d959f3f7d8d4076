//! Order types: the durable record, the persist input, the notification and
//! the `/buy` wire bodies.

mod types;

pub use types::{
    BuyRequest, BuyResponse, NewOrder, ORDERS_CHANNEL, Order, OrderNotification,
    PRODUCT_ID_MAX_LEN, STATUS_PENDING,
};
