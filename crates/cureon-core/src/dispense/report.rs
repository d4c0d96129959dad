//! Plain-text summaries shown after a dispense attempt.

use crate::models::{StockShortfall, StockUpdate};

pub fn shortfall_line(item: &StockShortfall) -> String {
    match &item.reason {
        Some(reason) => format!("• {}: {}", item.name, reason),
        None => format!(
            "• {}: Need {}, only {} available",
            item.name,
            item.needed.unwrap_or(0),
            item.available.unwrap_or(0)
        ),
    }
}

/// One line per short item, in order.
pub fn render_shortfalls(items: &[StockShortfall]) -> String {
    items.iter().map(shortfall_line).collect::<Vec<_>>().join("\n")
}

pub fn render_stock_updates(updates: &[StockUpdate]) -> String {
    updates
        .iter()
        .map(|u| {
            format!(
                "• {}: -{} ({} left)",
                u.medicine, u.quantity_dispensed, u.remaining_stock
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_shortfalls() {
        let items = vec![
            StockShortfall::quantity("Paracetamol", 10, 4),
            StockShortfall::reason("Ibuprofen", "not in inventory"),
        ];
        let text = render_shortfalls(&items);
        assert_eq!(
            text,
            "• Paracetamol: Need 10, only 4 available\n• Ibuprofen: not in inventory"
        );
        assert_eq!(text.lines().count(), items.len());
        assert_eq!(render_shortfalls(&[]), "");
    }

    #[test]
    fn test_render_stock_updates() {
        let updates = vec![StockUpdate {
            medicine: "Amoxicillin".into(),
            quantity_dispensed: 15,
            remaining_stock: 35,
        }];
        assert_eq!(render_stock_updates(&updates), "• Amoxicillin: -15 (35 left)");
    }
}
