//! GraphQL operations against the Shopify Admin API.
//!
//! The app uses a handful of small operations, so the `graphql_client`
//! request/response types are written out by hand instead of generated from
//! a schema dump. Each operation gets a module holding its document,
//! `Variables` and `ResponseData`, mirroring what `#[derive(GraphQLQuery)]`
//! produces.

use graphql_client::{GraphQLQuery, QueryBody};
use serde::{Deserialize, Serialize};

macro_rules! graphql_operation {
    ($name:ident, $module:ident) => {
        pub struct $name;

        impl GraphQLQuery for $name {
            type Variables = $module::Variables;
            type ResponseData = $module::ResponseData;

            fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
                QueryBody {
                    variables,
                    query: $module::QUERY,
                    operation_name: $module::OPERATION_NAME,
                }
            }
        }
    };
}

/// A user error from a mutation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct UserError {
    /// Input path the error refers to.
    #[serde(default)]
    pub field: Option<Vec<String>>,
    /// Human-readable message.
    pub message: String,
    /// Machine-readable code (e.g., `TAKEN`).
    #[serde(default)]
    pub code: Option<String>,
}

/// Join user error messages for display.
#[must_use]
pub fn join_user_errors(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(|e| e.message.clone())
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Shop identity
// =============================================================================

graphql_operation!(ShopIdentity, shop_identity);

pub mod shop_identity {
    use super::{Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "ShopIdentity";
    pub const QUERY: &str = "query ShopIdentity { shop { id } }";

    #[derive(Debug, Serialize)]
    pub struct Variables;

    #[derive(Debug, Deserialize)]
    pub struct ResponseData {
        pub shop: Shop,
    }

    #[derive(Debug, Deserialize)]
    pub struct Shop {
        pub id: String,
    }
}

// =============================================================================
// Metafield upsert
// =============================================================================

graphql_operation!(MetafieldsSet, metafields_set);

pub mod metafields_set {
    use super::{Deserialize, Serialize, UserError};

    pub const OPERATION_NAME: &str = "MetafieldsSet";
    pub const QUERY: &str = r"mutation MetafieldsSet($metafields: [MetafieldsSetInput!]!) {
  metafieldsSet(metafields: $metafields) {
    metafields { id key namespace }
    userErrors { field message code }
  }
}";

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub metafields: Vec<MetafieldsSetInput>,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MetafieldsSetInput {
        pub owner_id: String,
        pub namespace: String,
        pub key: String,
        #[serde(rename = "type")]
        pub value_type: String,
        pub value: String,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub metafields_set: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        #[serde(default)]
        pub user_errors: Vec<UserError>,
    }
}

// =============================================================================
// Metafield definitions
// =============================================================================

graphql_operation!(MetafieldDefinitions, metafield_definitions);

pub mod metafield_definitions {
    use super::{Deserialize, Serialize};
    use crate::shopify::types::MetafieldDefinition;

    pub const OPERATION_NAME: &str = "MetafieldDefinitions";
    pub const QUERY: &str = r"query MetafieldDefinitions($namespace: String!) {
  metafieldDefinitions(first: 50, ownerType: PRODUCT, namespace: $namespace) {
    nodes { id namespace key }
  }
}";

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub namespace: String,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub metafield_definitions: Connection,
    }

    #[derive(Debug, Deserialize)]
    pub struct Connection {
        pub nodes: Vec<MetafieldDefinition>,
    }
}

graphql_operation!(MetafieldDefinitionCreate, metafield_definition_create);

pub mod metafield_definition_create {
    use super::{Deserialize, Serialize, UserError};

    pub const OPERATION_NAME: &str = "MetafieldDefinitionCreate";
    pub const QUERY: &str = r"mutation MetafieldDefinitionCreate($definition: MetafieldDefinitionInput!) {
  metafieldDefinitionCreate(definition: $definition) {
    createdDefinition { id }
    userErrors { field message code }
  }
}";

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub definition: MetafieldDefinitionInput,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MetafieldDefinitionInput {
        pub name: String,
        pub namespace: String,
        pub key: String,
        pub description: String,
        #[serde(rename = "type")]
        pub value_type: String,
        pub owner_type: &'static str,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub metafield_definition_create: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub created_definition: Option<CreatedDefinition>,
        #[serde(default)]
        pub user_errors: Vec<UserError>,
    }

    #[derive(Debug, Deserialize)]
    pub struct CreatedDefinition {
        pub id: String,
    }
}
