//! Pharmacy inventory models and the all-or-nothing dispense plan.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

use super::Prescription;

fn default_min_stock() -> u32 {
    10
}

/// A medicine stocked by the pharmacy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub generic_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub strength: Option<String>,
    #[serde(default)]
    pub form_type: Option<String>,
    #[serde(default)]
    pub price: f64,
    /// Units on hand; never negative
    pub stock: u32,
    /// Low-stock threshold
    #[serde(default = "default_min_stock")]
    pub min_stock: u32,
    pub expiry_date: DateTime<Utc>,
    #[serde(default)]
    pub batch_number: Option<String>,
}

impl Medicine {
    pub fn new(id: impl Into<String>, name: impl Into<String>, stock: u32, expiry_date: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            generic_name: None,
            category: None,
            manufacturer: None,
            strength: None,
            form_type: None,
            price: 0.0,
            stock,
            min_stock: default_min_stock(),
            expiry_date,
            batch_number: None,
        }
    }

    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Running low but not yet out.
    pub fn is_low_stock(&self) -> bool {
        self.stock > 0 && self.stock <= self.min_stock
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date <= now
    }

    /// Not yet expired, but will be within `days`.
    pub fn expires_within(&self, days: i64, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && self.expiry_date <= now + Duration::days(days)
    }

    /// Case-insensitive name or generic-name match.
    pub fn answers_to(&self, name: &str) -> bool {
        let wanted = name.trim().to_lowercase();
        self.name.trim().to_lowercase() == wanted
            || self
                .generic_name
                .as_deref()
                .map(|g| g.trim().to_lowercase() == wanted)
                .unwrap_or(false)
    }
}

/// Editable medicine fields sent on add and update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MedicineDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_type: Option<String>,
    pub price: f64,
    pub stock: u32,
    pub min_stock: u32,
    pub expiry_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<String>,
}

impl From<&Medicine> for MedicineDraft {
    fn from(m: &Medicine) -> Self {
        Self {
            name: m.name.clone(),
            generic_name: m.generic_name.clone(),
            category: m.category.clone(),
            manufacturer: m.manufacturer.clone(),
            strength: m.strength.clone(),
            form_type: m.form_type.clone(),
            price: m.price,
            stock: m.stock,
            min_stock: m.min_stock,
            expiry_date: m.expiry_date,
            batch_number: m.batch_number.clone(),
        }
    }
}

/// Inventory change applied by a successful dispense.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    pub medicine: String,
    pub quantity_dispensed: u32,
    pub remaining_stock: u32,
}

/// A medicine that blocks a dispense.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StockShortfall {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StockShortfall {
    pub fn quantity(name: impl Into<String>, needed: u32, available: u32) -> Self {
        Self {
            name: name.into(),
            needed: Some(needed),
            available: Some(available),
            reason: None,
        }
    }

    pub fn reason(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            needed: None,
            available: None,
            reason: Some(reason.into()),
        }
    }
}

/// Plan the inventory decrements for a prescription.
///
/// Either every line can be served and the full list of updates is returned,
/// or nothing is applied and every blocking line is reported.
pub fn plan_dispense(
    inventory: &[Medicine],
    prescription: &Prescription,
    now: DateTime<Utc>,
) -> Result<Vec<StockUpdate>, Vec<StockShortfall>> {
    // Same medicine may appear on several lines
    let mut needed: Vec<(usize, u32)> = Vec::new();
    let mut index_of: HashMap<usize, usize> = HashMap::new();
    let mut shortfalls = Vec::new();

    for line in &prescription.medications {
        match inventory.iter().position(|m| m.answers_to(&line.name)) {
            Some(pos) => match index_of.get(&pos) {
                Some(&slot) => {
                    needed[slot].1 = needed[slot].1.saturating_add(line.units_required())
                }
                None => {
                    index_of.insert(pos, needed.len());
                    needed.push((pos, line.units_required()));
                }
            },
            None => shortfalls.push(StockShortfall::reason(&line.name, "not in inventory")),
        }
    }

    for &(pos, units) in &needed {
        let medicine = &inventory[pos];
        if medicine.is_expired(now) {
            shortfalls.push(StockShortfall::reason(
                &medicine.name,
                format!("expired on {}", medicine.expiry_date.format("%Y-%m-%d")),
            ));
        } else if medicine.stock < units {
            shortfalls.push(StockShortfall::quantity(&medicine.name, units, medicine.stock));
        }
    }

    if !shortfalls.is_empty() {
        return Err(shortfalls);
    }

    Ok(needed
        .into_iter()
        .map(|(pos, units)| StockUpdate {
            medicine: inventory[pos].name.clone(),
            quantity_dispensed: units,
            remaining_stock: inventory[pos].stock - units,
        })
        .collect())
}

/// Apply planned updates to an inventory snapshot.
pub fn apply_stock_updates(inventory: &mut [Medicine], updates: &[StockUpdate]) {
    for update in updates {
        if let Some(medicine) = inventory.iter_mut().find(|m| m.name == update.medicine) {
            medicine.stock = update.remaining_stock;
        }
    }
}

/// Rank inventory entries against a search box query.
pub fn search_medicines<'a>(inventory: &'a [Medicine], query: &str, limit: usize) -> Vec<&'a Medicine> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return inventory.iter().take(limit).collect();
    }

    let mut scored: Vec<(f64, &Medicine)> = inventory
        .iter()
        .filter_map(|m| {
            let name = m.name.to_lowercase();
            let generic = m.generic_name.as_deref().unwrap_or_default().to_lowercase();
            let score = if name.contains(&query) || generic.contains(&query) {
                1.0
            } else {
                jaro_winkler(&query, &name).max(jaro_winkler(&query, &generic))
            };
            (score >= 0.8).then_some((score, m))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(limit).map(|(_, m)| m).collect()
}

/// The pharmacist's own pharmacy profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pharmacy {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineStats {
    pub total: u32,
    pub active: u32,
    pub low_stock: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStats {
    pub total: u32,
    pub pending: u32,
    pub today: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueStats {
    pub total: f64,
}

/// Dashboard counters from `GET /pharmacy/stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PharmacyStats {
    pub medicines: MedicineStats,
    pub orders: OrderStats,
    pub revenue: RevenueStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StockStatus {
    InStock,
    OutOfStock,
    LowStock,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MedicineSort {
    #[default]
    Name,
    Price,
    Stock,
    Expiry,
}

/// Query string for `GET /pharmacy/medicines/search`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_status: Option<StockStatus>,
    pub sort_by: MedicineSort,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl MedicineQuery {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: Some(keyword.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u32,
    pub page: u32,
    pub pages: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicinePage {
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// Absolute stock level for one medicine in a bulk update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustment {
    pub medicine_id: String,
    pub new_stock: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Medication, PartyRef};

    fn inventory(now: DateTime<Utc>) -> Vec<Medicine> {
        let mut para = Medicine::new("m1", "Paracetamol", 4, now + Duration::days(365));
        para.generic_name = Some("Acetaminophen".into());
        vec![
            para,
            Medicine::new("m2", "Amoxicillin", 50, now + Duration::days(20)),
            Medicine::new("m3", "Cough Syrup", 8, now - Duration::days(1)),
        ]
    }

    fn prescription(lines: &[(&str, u32)]) -> Prescription {
        let mut rx = Prescription::new("rx1", PartyRef::new("p1"), PartyRef::new("d1"));
        rx.medications = lines
            .iter()
            .map(|(name, qty)| {
                let mut m = Medication::new(*name, "1 tab", "daily");
                m.quantity = Some(*qty);
                m
            })
            .collect();
        rx
    }

    #[test]
    fn test_stock_flags() {
        let now = Utc::now();
        let inv = inventory(now);
        assert!(inv[0].is_low_stock());
        assert!(!inv[1].is_low_stock());
        assert!(inv[1].expires_within(30, now));
        assert!(!inv[0].expires_within(30, now));
        assert!(inv[2].is_expired(now));
        assert!(!inv[2].expires_within(30, now));
    }

    #[test]
    fn test_plan_reports_quantity_shortfall() {
        let now = Utc::now();
        let inv = inventory(now);
        let rx = prescription(&[("Paracetamol", 10)]);

        let shortfalls = plan_dispense(&inv, &rx, now).unwrap_err();
        assert_eq!(shortfalls, vec![StockShortfall::quantity("Paracetamol", 10, 4)]);
    }

    #[test]
    fn test_plan_is_all_or_nothing() {
        let now = Utc::now();
        let inv = inventory(now);
        let rx = prescription(&[("Amoxicillin", 10), ("Ibuprofen", 1), ("cough syrup", 1)]);

        let shortfalls = plan_dispense(&inv, &rx, now).unwrap_err();
        assert_eq!(shortfalls.len(), 2);
        assert_eq!(shortfalls[0].reason.as_deref(), Some("not in inventory"));
        assert!(shortfalls[1].reason.as_deref().unwrap().starts_with("expired on"));
    }

    #[test]
    fn test_plan_aggregates_repeated_lines() {
        let now = Utc::now();
        let mut inv = inventory(now);
        let rx = prescription(&[("Amoxicillin", 10), ("amoxicillin", 15), ("acetaminophen", 4)]);

        let updates = plan_dispense(&inv, &rx, now).unwrap();
        assert_eq!(
            updates,
            vec![
                StockUpdate {
                    medicine: "Amoxicillin".into(),
                    quantity_dispensed: 25,
                    remaining_stock: 25
                },
                StockUpdate {
                    medicine: "Paracetamol".into(),
                    quantity_dispensed: 4,
                    remaining_stock: 0
                },
            ]
        );

        apply_stock_updates(&mut inv, &updates);
        assert_eq!(inv[1].stock, 25);
        assert!(!inv[0].in_stock());
    }

    #[test]
    fn test_plan_huge_repeated_quantities() {
        let now = Utc::now();
        let inv = inventory(now);
        let rx = prescription(&[("Paracetamol", u32::MAX), ("Paracetamol", u32::MAX)]);

        let shortfalls = plan_dispense(&inv, &rx, now).unwrap_err();
        assert_eq!(shortfalls, vec![StockShortfall::quantity("Paracetamol", u32::MAX, 4)]);
    }

    #[test]
    fn test_search_medicines() {
        let now = Utc::now();
        let inv = inventory(now);

        let hits = search_medicines(&inv, "amox", 5);
        assert_eq!(hits[0].id, "m2");

        let hits = search_medicines(&inv, "paracetmol", 5);
        assert_eq!(hits[0].id, "m1");

        assert_eq!(search_medicines(&inv, "", 2).len(), 2);
        assert!(search_medicines(&inv, "zzzz", 5).is_empty());
    }

    #[test]
    fn test_medicine_wire_defaults() {
        let med: Medicine = serde_json::from_str(
            r#"{"_id":"m9","name":"ORS","stock":3,"expiryDate":"2030-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(med.min_stock, 10);
        assert!(med.is_low_stock());
    }

    #[test]
    fn test_stats_and_query_wire() {
        let stats: PharmacyStats = serde_json::from_str(
            r#"{"medicines":{"total":40,"active":38,"lowStock":3},
                "orders":{"total":12,"pending":2,"today":1},
                "revenue":{"total":1520.5}}"#,
        )
        .unwrap();
        assert_eq!(stats.medicines.low_stock, 3);
        assert_eq!(stats.revenue.total, 1520.5);

        let query = MedicineQuery {
            stock_status: Some(StockStatus::LowStock),
            ..MedicineQuery::keyword("para")
        };
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["keyword"], "para");
        assert_eq!(json["stockStatus"], "lowStock");
        assert_eq!(json["sortBy"], "name");
        assert!(json.get("page").is_none());
    }
}
