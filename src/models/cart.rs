use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::cart_items;

/// One line in a user's cart. `unit_price` is the product price captured at
/// the moment the item was added, not the live catalog price.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = cart_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = cart_items)]
pub struct NewCartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

/// Sum of quantity x captured unit price over the given items.
pub fn cart_total(items: &[CartItem]) -> BigDecimal {
    items
        .iter()
        .map(|i| &i.unit_price * BigDecimal::from(i.quantity))
        .sum()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn item(quantity: i32, unit_price: &str) -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity,
            unit_price: BigDecimal::from_str(unit_price).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn total_of_empty_cart_is_zero() {
        assert_eq!(cart_total(&[]), BigDecimal::from(0));
    }

    #[test]
    fn total_multiplies_quantity_by_captured_price() {
        let items = vec![item(2, "9.99"), item(3, "1.50")];
        assert_eq!(cart_total(&items), BigDecimal::from_str("24.48").unwrap());
    }
}
