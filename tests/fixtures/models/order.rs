use serde::{Deserialize, Serialize};

/// A placed order
#[derive(Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    #[serde(rename = "customerNote")]
    pub note: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    Shipped,
}

#[derive(Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: String,
    pub quantity: u32,
}
