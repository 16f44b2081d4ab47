//! Server-side cart pricing using rust_decimal
//!
//! Client-submitted prices and totals are never trusted. Every amount here is
//! derived from catalog data: two batched lookups (products, option values)
//! followed by pure arithmetic.

use std::collections::{BTreeSet, HashMap, HashSet};

use rust_decimal::prelude::*;
use shared::models::DeliveryMethod;
use shared::order::CartLine;

use crate::db::{CatalogOptionValue, CatalogProduct, CatalogReader};
use crate::error::{OrderError, OrderResult};

/// Rounding for monetary values (2 decimal places, half away from zero)
const DECIMAL_PLACES: u32 = 2;

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Resolved option value on a priced line
#[derive(Debug, Clone, PartialEq)]
pub struct PricedOption {
    pub option_id: i64,
    pub option_name: String,
    pub value_id: i64,
    pub value_name: String,
    pub price_adjustment: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: i64,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub options: Vec<PricedOption>,
}

/// Fully priced cart
#[derive(Debug, Clone, PartialEq)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
    pub delivery_charge: Decimal,
    pub total: Decimal,
}

/// Look up catalog data for a cart and price it
///
/// Issues exactly one product lookup and at most one option-value lookup.
pub async fn resolve_cart(
    catalog: &dyn CatalogReader,
    lines: &[CartLine],
    delivery_method: DeliveryMethod,
    delivery_charge: Decimal,
) -> OrderResult<PricedCart> {
    let product_ids: Vec<i64> = lines
        .iter()
        .map(|l| l.product_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let value_ids: Vec<i64> = lines
        .iter()
        .flat_map(|l| l.options())
        .flat_map(|o| o.values.iter().map(|v| v.id))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let products = catalog.products_by_ids(&product_ids).await?;
    let values = if value_ids.is_empty() {
        Vec::new()
    } else {
        catalog.option_values_by_ids(&value_ids).await?
    };

    price_cart(lines, &products, &values, delivery_method, delivery_charge)
}

/// Price a cart against already-fetched catalog rows
pub fn price_cart(
    lines: &[CartLine],
    products: &[CatalogProduct],
    values: &[CatalogOptionValue],
    delivery_method: DeliveryMethod,
    delivery_charge: Decimal,
) -> OrderResult<PricedCart> {
    let products: HashMap<i64, &CatalogProduct> = products.iter().map(|p| (p.id, p)).collect();
    let values: HashMap<i64, &CatalogOptionValue> = values.iter().map(|v| (v.id, v)).collect();

    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        let product = products
            .get(&line.product_id)
            .filter(|p| p.is_active)
            .ok_or(OrderError::InvalidProduct(line.product_id))?;

        // Unknown values, values of another option or product, and repeats are skipped
        let mut seen = HashSet::new();
        let mut options = Vec::new();
        for selected in line.options() {
            for v in &selected.values {
                let Some(cv) = values.get(&v.id) else { continue };
                if cv.option_id != selected.option_id
                    || cv.product_id != product.id
                    || !seen.insert(cv.id)
                {
                    continue;
                }
                options.push(PricedOption {
                    option_id: cv.option_id,
                    option_name: cv.option_name.clone(),
                    value_id: cv.id,
                    value_name: cv.name.clone(),
                    price_adjustment: cv.price_adjustment,
                });
            }
        }

        let adjustments: Decimal = options.iter().map(|o| o.price_adjustment).sum();
        let unit_price = round_money(product.price + adjustments);
        let line_total = round_money(unit_price * Decimal::from(line.quantity));

        priced.push(PricedLine {
            product_id: product.id,
            product_name: product.name.clone(),
            unit_price,
            quantity: line.quantity,
            line_total,
            options,
        });
    }

    let subtotal: Decimal = priced.iter().map(|l| l.line_total).sum();
    let delivery_charge = match delivery_method {
        DeliveryMethod::Delivery => round_money(delivery_charge),
        DeliveryMethod::Pickup => Decimal::ZERO,
    };

    Ok(PricedCart {
        lines: priced,
        subtotal,
        delivery_charge,
        total: subtotal + delivery_charge,
    })
}
