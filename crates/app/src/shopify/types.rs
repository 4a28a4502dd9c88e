//! REST payloads exchanged with the Admin API.
//!
//! Only the fields this app reads are modelled; everything else in the
//! responses is ignored.

use serde::{Deserialize, Deserializer, Serialize};

/// A product metafield.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Metafield {
    /// Numeric metafield id (used for deletion).
    pub id: u64,
    /// Namespace the metafield lives in.
    pub namespace: String,
    /// Key within the namespace.
    pub key: String,
    /// Raw value. REST returns booleans and numbers unquoted; they are
    /// normalized to their string form here.
    #[serde(deserialize_with = "value_as_string")]
    pub value: String,
    /// Metafield type (e.g., `boolean`, `list.product_reference`).
    #[serde(rename = "type", default)]
    pub value_type: String,
}

fn value_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// A metafield definition, as listed over GraphQL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetafieldDefinition {
    /// Definition global id.
    pub id: String,
    /// Namespace.
    pub namespace: String,
    /// Key.
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetafieldsEnvelope {
    pub metafields: Vec<Metafield>,
}

/// A product variant's inventory linkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ProductVariant {
    /// Variant id.
    pub id: u64,
    /// Inventory item tracked for this variant.
    pub inventory_item_id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductVariants {
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductEnvelope {
    pub product: ProductVariants,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShopLocation {
    pub primary_location_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShopEnvelope {
    pub shop: ShopLocation,
}

/// Body of `POST inventory_levels/set.json`.
#[derive(Debug, Serialize)]
pub(crate) struct InventoryLevelSet {
    pub location_id: u64,
    pub inventory_item_id: u64,
    pub available: i64,
}
