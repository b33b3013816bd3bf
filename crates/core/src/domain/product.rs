use serde::{Deserialize, Serialize};

/// Dimensionality of the embedding vector stored alongside each product.
pub const EMBEDDING_DIM: u32 = 768;

/// A catalog product as returned by the similarity-search collaborator.
///
/// Owned and mutated exclusively by the external search backend; the agent
/// only ever consumes read results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub product_name: String,
    pub price: f64,
    #[serde(default)]
    pub description: String,
    pub category_tier_one: String,
    pub category_tier_two: String,
    pub category_tier_three: String,
    /// Free-text representation fed to the embedder on ingestion.
    #[serde(default)]
    pub search_text: String,
}

/// Field type as understood by the vector search engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EngineType {
    Int64,
    Double,
    VarChar { max_length: u32 },
    FloatVector { dim: u32 },
}

/// One row of the hand-written schema-descriptor table linking a `Product`
/// field to its search-engine column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub engine_type: EngineType,
    pub is_primary: bool,
}

/// Explicit schema for the product collection. The `Product` struct and this
/// table are separately declared but must stay in sync; `engine_schema` and
/// the tests below are the linkage.
pub const SEARCH_FIELD_SPECS: &[FieldSpec] = &[
    FieldSpec { name: "id", engine_type: EngineType::Int64, is_primary: true },
    FieldSpec {
        name: "product_name",
        engine_type: EngineType::VarChar { max_length: 512 },
        is_primary: false,
    },
    FieldSpec { name: "price", engine_type: EngineType::Double, is_primary: false },
    FieldSpec {
        name: "description",
        engine_type: EngineType::VarChar { max_length: 4096 },
        is_primary: false,
    },
    FieldSpec {
        name: "category_tier_one",
        engine_type: EngineType::VarChar { max_length: 128 },
        is_primary: false,
    },
    FieldSpec {
        name: "category_tier_two",
        engine_type: EngineType::VarChar { max_length: 128 },
        is_primary: false,
    },
    FieldSpec {
        name: "category_tier_three",
        engine_type: EngineType::VarChar { max_length: 128 },
        is_primary: false,
    },
    FieldSpec {
        name: "search_text",
        engine_type: EngineType::VarChar { max_length: 8192 },
        is_primary: false,
    },
    FieldSpec {
        name: "embedding",
        engine_type: EngineType::FloatVector { dim: EMBEDDING_DIM },
        is_primary: false,
    },
];

/// Render the descriptor table as the JSON document the search backend
/// expects when creating a collection.
pub fn engine_schema(collection_name: &str) -> serde_json::Value {
    let fields: Vec<serde_json::Value> = SEARCH_FIELD_SPECS
        .iter()
        .map(|spec| {
            serde_json::json!({
                "name": spec.name,
                "type": spec.engine_type,
                "is_primary": spec.is_primary,
            })
        })
        .collect();

    serde_json::json!({
        "collection_name": collection_name,
        "fields": fields,
    })
}

#[cfg(test)]
mod tests {
    use super::{engine_schema, EngineType, Product, EMBEDDING_DIM, SEARCH_FIELD_SPECS};

    #[test]
    fn descriptor_table_has_exactly_one_primary_key() {
        let primaries: Vec<_> =
            SEARCH_FIELD_SPECS.iter().filter(|spec| spec.is_primary).collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].name, "id");
        assert_eq!(primaries[0].engine_type, EngineType::Int64);
    }

    #[test]
    fn descriptor_table_covers_every_serialized_product_field() {
        let product = Product {
            id: 1,
            product_name: "Áo thun cotton".to_string(),
            price: 150_000.0,
            description: "Áo thun cotton trắng".to_string(),
            category_tier_one: "thời trang nam".to_string(),
            category_tier_two: "áo".to_string(),
            category_tier_three: "áo thun".to_string(),
            search_text: "áo thun cotton trắng thời trang nam".to_string(),
        };

        let value = serde_json::to_value(&product).expect("serialize product");
        let object = value.as_object().expect("product serializes to object");

        for field_name in object.keys() {
            assert!(
                SEARCH_FIELD_SPECS.iter().any(|spec| spec.name == field_name),
                "product field `{field_name}` missing from the schema descriptor table"
            );
        }
    }

    #[test]
    fn engine_schema_embeds_vector_dimensionality() {
        let schema = engine_schema("e_commerce_ai");
        assert_eq!(schema["collection_name"], "e_commerce_ai");

        let fields = schema["fields"].as_array().expect("fields array");
        assert_eq!(fields.len(), SEARCH_FIELD_SPECS.len());

        let embedding = fields
            .iter()
            .find(|field| field["name"] == "embedding")
            .expect("embedding field present");
        assert_eq!(embedding["type"]["kind"], "float_vector");
        assert_eq!(embedding["type"]["dim"], EMBEDDING_DIM);
    }
}
