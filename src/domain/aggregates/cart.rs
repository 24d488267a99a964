//! Cart Aggregate

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::Money;

/// Upper bound for a single line; listings are mostly one-off items.
pub const MAX_LINE_QUANTITY: u32 = 99;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
    subtotal: Money,
    currency: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

impl Cart {
    pub fn new(currency: &str) -> Self {
        Self { items: vec![], subtotal: Money::zero(currency), currency: currency.to_uppercase() }
    }

    pub fn from_items(currency: &str, items: Vec<CartItem>) -> Self {
        let mut cart = Self::new(currency);
        for item in items {
            cart.add_item(item);
        }
        cart
    }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn quantity_of(&self, product_id: Uuid) -> u32 {
        self.items.iter().find(|i| i.product_id == product_id).map_or(0, |i| i.quantity)
    }

    pub fn add_item(&mut self, item: CartItem) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == item.product_id) {
            existing.quantity = (existing.quantity + item.quantity).min(MAX_LINE_QUANTITY);
        } else {
            self.items.push(item);
        }
        self.recalculate();
    }

    /// Sets a line's quantity; zero removes the line.
    pub fn set_quantity(&mut self, product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        if quantity > MAX_LINE_QUANTITY { return Err(CartError::QuantityTooLarge(quantity)); }
        let index = self.position(product_id)?;
        match quantity {
            0 => { self.items.remove(index); }
            n => self.items[index].quantity = n,
        }
        self.recalculate();
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let index = self.position(product_id)?;
        self.items.remove(index);
        self.recalculate();
        Ok(())
    }

    fn position(&self, product_id: Uuid) -> Result<usize, CartError> {
        self.items.iter().position(|i| i.product_id == product_id).ok_or(CartError::ItemNotFound)
    }

    pub fn clear(&mut self) { self.items.clear(); self.recalculate(); }

    fn recalculate(&mut self) {
        let mut subtotal = Money::zero(&self.currency);
        for line in &self.items {
            // Lines are priced in the cart currency; a mismatched line is left out of the total.
            if let Ok(sum) = subtotal.add(&line.line_total()) {
                subtotal = sum;
            }
        }
        self.subtotal = subtotal;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("item not in cart")]
    ItemNotFound,
    #[error("quantity {0} exceeds the per-item limit")]
    QuantityTooLarge(u32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn kettle(qty: u32) -> CartItem {
        CartItem { product_id: Uuid::from_u128(1), title: "Kettle".into(), quantity: qty, unit_price: Money::ghs(Decimal::new(10, 0)) }
    }

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::new("GHS");
        cart.add_item(kettle(2));
        assert_eq!(cart.item_count(), 2);
        assert_eq!(cart.subtotal().amount(), Decimal::new(20, 0));
        cart.add_item(kettle(1));
        assert_eq!(cart.items()[0].quantity, 3);
        cart.set_quantity(Uuid::from_u128(1), 5).unwrap();
        assert_eq!(cart.subtotal().amount(), Decimal::new(50, 0));
        cart.set_quantity(Uuid::from_u128(1), 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal().amount(), Decimal::ZERO);
    }

    #[test]
    fn test_quantity_limits() {
        let mut cart = Cart::from_items("GHS", vec![kettle(1)]);
        assert_eq!(cart.set_quantity(Uuid::from_u128(1), 100), Err(CartError::QuantityTooLarge(100)));
        assert_eq!(cart.set_quantity(Uuid::from_u128(2), 1), Err(CartError::ItemNotFound));
        assert_eq!(cart.remove_item(Uuid::from_u128(2)), Err(CartError::ItemNotFound));
    }
}
