use chrono::Utc;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

use crate::sqlite::{encode_timestamp, query_one, row_to_product, PRODUCT_COLUMNS};
use crate::{money, LedgerError, LedgerResult, Product, SqliteLedger};

impl SqliteLedger {
    /// Insert or replace the cost-relevant fields of a catalog product.
    pub fn upsert_product(&self, product: &Product) -> LedgerResult<Product> {
        for (label, value) in [("price", product.price), ("wholesale price", product.wholesale_price)] {
            if matches!(value, Some(price) if price < Decimal::ZERO) {
                return Err(LedgerError::validation(format!(
                    "product {} {label} must not be negative",
                    product.id
                )));
            }
        }
        let stored = Product {
            price: product.price.map(money),
            wholesale_price: product.wholesale_price.map(money),
            ..product.clone()
        };
        self.write(|tx| {
            tx.execute(
                "INSERT INTO products (id, device_id, name, price, wholesale_price, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (id, device_id) DO UPDATE SET
                    name = excluded.name,
                    price = excluded.price,
                    wholesale_price = excluded.wholesale_price,
                    updated_at = excluded.updated_at",
                params![
                    stored.id,
                    stored.device_id,
                    stored.name,
                    stored.price.map(|value| value.to_string()),
                    stored.wholesale_price.map(|value| value.to_string()),
                    encode_timestamp(Utc::now()),
                ],
            )?;
            Ok(())
        })?;
        Ok(stored)
    }

    pub fn product(&self, device_id: i64, product_id: i64) -> LedgerResult<Option<Product>> {
        self.read(|conn| find_product(conn, device_id, product_id))
    }
}

pub(crate) fn find_product(
    conn: &Connection,
    device_id: i64,
    product_id: i64,
) -> LedgerResult<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND device_id = ?2"),
        params![product_id, device_id],
        row_to_product,
    )
}
