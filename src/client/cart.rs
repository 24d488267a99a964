//! Client-side cart with optimistic quantity edits.

use tokio::sync::RwLock;
use uuid::Uuid;

use super::{optimistic, ApiClient, ClientError};
use crate::api::cart::CartView;
use crate::domain::aggregates::{Cart, MAX_LINE_QUANTITY};

pub struct CartStore {
    api: ApiClient,
    cart: RwLock<CartView>,
}

impl CartStore {
    pub fn new(api: ApiClient) -> Self {
        Self { api, cart: RwLock::new(CartView::from(Cart::new("GHS"))) }
    }

    pub async fn load(&self) -> Result<CartView, ClientError> {
        let view: CartView = self.api.get("/cart").await?;
        *self.cart.write().await = view.clone();
        Ok(view)
    }

    pub async fn snapshot(&self) -> CartView { self.cart.read().await.clone() }

    /// Shows the new quantity (and totals) at once, then asks the server. On failure the
    /// previous cart comes back; on success the server's view replaces the local one.
    pub async fn set_quantity(&self, product_id: Uuid, quantity: u32) -> Result<CartView, ClientError> {
        let local = preview(&self.snapshot().await, product_id, quantity);
        let path = format!("/cart/items/{product_id}");
        let body = serde_json::json!({ "quantity": quantity });
        let confirmed: CartView = optimistic::apply(
            &self.cart,
            |cart: &mut CartView| Some(cart),
            local,
            || self.api.patch(&path, &body),
        )
        .await?;
        *self.cart.write().await = confirmed.clone();
        Ok(confirmed)
    }
}

/// Lines not yet in the cart are left for the server to price.
fn preview(current: &CartView, product_id: Uuid, quantity: u32) -> CartView {
    let items = current
        .items
        .iter()
        .cloned()
        .filter_map(|mut item| {
            if item.product_id == product_id {
                item.quantity = quantity.min(MAX_LINE_QUANTITY);
            }
            (item.quantity > 0).then_some(item)
        })
        .collect();
    Cart::from_items(current.subtotal.currency(), items).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::TestApp;
    use crate::domain::aggregates::Role;

    #[tokio::test]
    async fn test_refused_quantity_reverts() {
        let app = TestApp::new();
        let base = app.serve().await;
        let seller = app.user("Esi", Role::Customer).await;
        let buyer = app.user("Kwame", Role::Customer).await;
        let kettle = app.product(&seller, "Kettle", 2500).await;
        app.state.repo.set_cart_quantity(buyer.user.id, kettle.id(), 2).await.unwrap();

        let store = CartStore::new(ApiClient::new(&base).with_token(&buyer.token));
        assert_eq!(store.load().await.unwrap().item_count, 2);

        let view = store.set_quantity(kettle.id(), 3).await.unwrap();
        assert_eq!(view.item_count, 3);
        assert_eq!(store.snapshot().await, view);
        assert_eq!(app.state.repo.cart_lines(buyer.user.id).await.unwrap(), vec![(kettle.id(), 3)]);

        let err = store.set_quantity(kettle.id(), 100).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 422, .. }));
        assert_eq!(store.snapshot().await, view);

        let emptied = store.set_quantity(kettle.id(), 0).await.unwrap();
        assert!(emptied.items.is_empty());
    }

    #[test]
    fn test_preview_recomputes_totals() {
        let line = |id, quantity| crate::domain::aggregates::CartItem {
            product_id: id,
            title: "Mug".into(),
            quantity,
            unit_price: crate::domain::value_objects::Money::ghs(rust_decimal::Decimal::new(1000, 2)),
        };
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let current: CartView = Cart::from_items("GHS", vec![line(a, 1), line(b, 2)]).into();

        let raised = preview(&current, a, 4);
        assert_eq!(raised.item_count, 6);
        assert_eq!(raised.subtotal.amount(), rust_decimal::Decimal::new(6000, 2));
        assert_eq!(preview(&current, b, 0).items.len(), 1);
        assert_eq!(preview(&current, Uuid::new_v4(), 5), current);
    }
}
