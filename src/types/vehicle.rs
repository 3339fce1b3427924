use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Vehicle entity - a bus or van that runs one route per assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub license_plate: Option<String>,
    /// Total passenger seats
    pub seats: u32,
    /// Wheelchair slots
    #[serde(default)]
    pub wheelchair_slots: u32,
}

/// Driver entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}
