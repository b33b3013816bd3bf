use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use salesbot_core::Product;

use crate::tools::{Tool, ToolError};

pub const DEFAULT_PRICE_CEILING: f64 = 1e9;
pub const DEFAULT_PRODUCT_AMOUNT: u32 = 5;
pub const MAX_PRODUCT_AMOUNT: u32 = 10;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog backend error: {0}")]
    Backend(String),
}

/// Filters for one similarity search against the product store.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchQuery {
    pub description: String,
    pub price_range: [f64; 2],
    pub category_tier_one: Option<String>,
    pub category_tier_two: Option<String>,
    pub category_tier_three: Option<String>,
    /// Number of results to return after `offset` is applied.
    pub amount: u32,
    /// Skip the first N hits, used to page past already-suggested products.
    pub offset: u32,
    pub excluded_product_names: Vec<String>,
}

/// Vector-similarity product search. Implemented by an external backend.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Product>, CatalogError>;
}

/// Category hierarchy lookup: given the upper tiers, return the names one
/// tier below the deepest filter supplied (tier one when none given).
#[async_trait]
pub trait CategoryListing: Send + Sync {
    async fn list_categories(
        &self,
        tier_one: Option<&str>,
        tier_two: Option<&str>,
    ) -> Result<Vec<String>, CatalogError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderRequest {
    pub product_details: Vec<String>,
    pub amounts: Vec<u32>,
    pub customer_name: String,
    pub delivery_address: String,
    pub contact_phone: String,
}

/// Fire-and-forget order submission; the confirmation text is the only
/// read-back.
#[async_trait]
pub trait OrderIntake: Send + Sync {
    async fn submit_order(&self, order: &OrderRequest) -> Result<String, CatalogError>;
}

fn default_price_range() -> Vec<f64> {
    vec![0.0, DEFAULT_PRICE_CEILING]
}

fn default_amount() -> u32 {
    DEFAULT_PRODUCT_AMOUNT
}

#[derive(Debug, Deserialize)]
struct SearchProductsInput {
    #[serde(default)]
    description: String,
    #[serde(default = "default_price_range")]
    price_range: Vec<f64>,
    #[serde(default)]
    category_tier_one_name: Option<String>,
    #[serde(default)]
    category_tier_two_name: Option<String>,
    #[serde(default)]
    category_tier_three_name: Option<String>,
    #[serde(default = "default_amount")]
    product_amount: u32,
    #[serde(default)]
    product_offset: u32,
    #[serde(default)]
    excluded_product_names: Vec<String>,
}

impl SearchProductsInput {
    fn into_query(self) -> Result<SearchQuery, ToolError> {
        if self.price_range.len() != 2 {
            return Err(ToolError::InvalidInput(
                "price_range must be a [min, max] pair".to_string(),
            ));
        }
        let (min_price, max_price) = (self.price_range[0], self.price_range[1]);
        if !(min_price <= max_price) {
            return Err(ToolError::InvalidInput(format!(
                "price_range is inverted: min {min_price} > max {max_price}"
            )));
        }
        if self.product_amount < 1 || self.product_amount > MAX_PRODUCT_AMOUNT {
            return Err(ToolError::InvalidInput(format!(
                "product_amount must be in range 1..={MAX_PRODUCT_AMOUNT}"
            )));
        }

        let lowered = |value: Option<String>| value.map(|name| name.to_lowercase());

        Ok(SearchQuery {
            description: self.description,
            price_range: [min_price, max_price],
            category_tier_one: lowered(self.category_tier_one_name),
            category_tier_two: lowered(self.category_tier_two_name),
            category_tier_three: lowered(self.category_tier_three_name),
            amount: self.product_amount,
            offset: self.product_offset,
            excluded_product_names: self.excluded_product_names,
        })
    }
}

/// Search the catalog for products matching the customer's need.
pub struct SearchProductsTool {
    search: Arc<dyn SimilaritySearch>,
}

impl SearchProductsTool {
    pub fn new(search: Arc<dyn SimilaritySearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for SearchProductsTool {
    fn name(&self) -> &'static str {
        "search_products"
    }

    fn description(&self) -> &'static str {
        "Tìm kiếm sản phẩm phù hợp với nhu cầu của khách hàng. Dùng khi khách \
         cần gợi ý hoặc tư vấn sản phẩm, hoặc muốn xem mẫu khác so với lần trước. \
         Để tránh lặp lại sản phẩm đã gợi ý, truyền excluded_product_names hoặc \
         tăng product_offset."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "Mô tả về sản phẩm cần tìm kiếm"
                },
                "price_range": {
                    "type": "array",
                    "items": {"type": "number"},
                    "minItems": 2,
                    "maxItems": 2,
                    "description": "Khoảng giá mong muốn [min, max]"
                },
                "category_tier_one_name": {
                    "type": "string",
                    "description": "Danh mục cấp 1, ví dụ: \"thời trang nam\""
                },
                "category_tier_two_name": {
                    "type": "string",
                    "description": "Danh mục cấp 2, ví dụ: \"áo\""
                },
                "category_tier_three_name": {
                    "type": "string",
                    "description": "Danh mục cấp 3, ví dụ: \"áo thun\""
                },
                "product_amount": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_PRODUCT_AMOUNT,
                    "description": "Số lượng sản phẩm muốn tìm"
                },
                "product_offset": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Bỏ qua N sản phẩm đầu tiên (khi lặp lại cùng tiêu chí)"
                },
                "excluded_product_names": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Tên các sản phẩm cần loại trừ khỏi kết quả"
                }
            }
        })
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let input: SearchProductsInput = serde_json::from_value(args)
            .map_err(|error| ToolError::InvalidInput(error.to_string()))?;
        let query = input.into_query()?;

        tracing::info!(
            event_name = "agent.tool.search_products",
            description = %query.description,
            price_min = query.price_range[0],
            price_max = query.price_range[1],
            amount = query.amount,
            offset = query.offset,
            "searching product catalog"
        );

        let hits = self
            .search
            .search(&query)
            .await
            .map_err(|error| ToolError::Execution(error.to_string()))?;

        let summaries: Vec<Value> = hits
            .iter()
            .map(|product| {
                json!({
                    "product_name": product.product_name,
                    "price": product.price,
                    "description": product.description,
                    "category_tier_one": product.category_tier_one,
                    "category_tier_two": product.category_tier_two,
                    "category_tier_three": product.category_tier_three,
                })
            })
            .collect();
        Ok(Value::Array(summaries))
    }
}

#[derive(Debug, Deserialize)]
struct ListCategoriesInput {
    #[serde(default)]
    tier_one_category_name: Option<String>,
    #[serde(default)]
    tier_two_category_name: Option<String>,
}

/// List the product category hierarchy one tier at a time.
pub struct ListCategoriesTool {
    categories: Arc<dyn CategoryListing>,
}

impl ListCategoriesTool {
    pub fn new(categories: Arc<dyn CategoryListing>) -> Self {
        Self { categories }
    }
}

#[async_trait]
impl Tool for ListCategoriesTool {
    fn name(&self) -> &'static str {
        "list_categories"
    }

    fn description(&self) -> &'static str {
        "Lấy danh sách phân loại sản phẩm. Không truyền gì thì trả về danh mục \
         cấp 1; truyền tier_one_category_name thì trả về các danh mục cấp 2 \
         thuộc danh mục đó; truyền tier_two_category_name thì trả về danh mục \
         cấp 3."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "tier_one_category_name": {
                    "type": "string",
                    "description": "Phân loại theo đối tượng, ví dụ \"thời trang nam\""
                },
                "tier_two_category_name": {
                    "type": "string",
                    "description": "Phân loại theo loại trang phục chính, ví dụ \"áo\""
                }
            }
        })
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let input: ListCategoriesInput = serde_json::from_value(args)
            .map_err(|error| ToolError::InvalidInput(error.to_string()))?;

        let names = self
            .categories
            .list_categories(
                input.tier_one_category_name.as_deref(),
                input.tier_two_category_name.as_deref(),
            )
            .await
            .map_err(|error| ToolError::Execution(error.to_string()))?;

        Ok(json!(names))
    }
}

#[derive(Debug, Deserialize)]
struct SubmitOrderInput {
    product_details: Vec<String>,
    amounts: Vec<u32>,
    #[serde(default)]
    customer_name: String,
    #[serde(default)]
    delivery_address: String,
    #[serde(default)]
    contact_phone: String,
}

impl SubmitOrderInput {
    fn into_request(self) -> Result<OrderRequest, ToolError> {
        if self.product_details.is_empty() {
            return Err(ToolError::InvalidInput(
                "product_details must contain at least one item".to_string(),
            ));
        }
        if self.product_details.len() != self.amounts.len() {
            return Err(ToolError::InvalidInput(format!(
                "product_details ({}) and amounts ({}) must have equal length",
                self.product_details.len(),
                self.amounts.len()
            )));
        }

        Ok(OrderRequest {
            product_details: self.product_details,
            amounts: self.amounts,
            customer_name: self.customer_name,
            delivery_address: self.delivery_address,
            contact_phone: self.contact_phone,
        })
    }
}

/// Draft and submit a new order once the customer has agreed to buy.
pub struct SubmitOrderTool {
    orders: Arc<dyn OrderIntake>,
}

impl SubmitOrderTool {
    pub fn new(orders: Arc<dyn OrderIntake>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl Tool for SubmitOrderTool {
    fn name(&self) -> &'static str {
        "submit_order"
    }

    fn description(&self) -> &'static str {
        "Tạo yêu cầu đặt hàng mới. Dùng khi khách hàng đã đồng ý mua và bạn đã \
         thu thập đủ thông tin. Công cụ gửi chi tiết đơn hàng đến bộ phận xử lý, \
         không tự hoàn tất giao dịch."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["product_details", "amounts"],
            "properties": {
                "product_details": {
                    "type": "array",
                    "items": {"type": "string"},
                    "minItems": 1,
                    "description": "Mô tả từng sản phẩm, ví dụ [\"Áo thun cotton trắng size M\"]"
                },
                "amounts": {
                    "type": "array",
                    "items": {"type": "integer"},
                    "minItems": 1,
                    "description": "Số lượng tương ứng từng sản phẩm"
                },
                "customer_name": {"type": "string", "description": "Tên khách hàng"},
                "delivery_address": {"type": "string", "description": "Địa chỉ giao hàng"},
                "contact_phone": {"type": "string", "description": "Số điện thoại liên hệ"}
            }
        })
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let input: SubmitOrderInput = serde_json::from_value(args)
            .map_err(|error| ToolError::InvalidInput(error.to_string()))?;
        let order = input.into_request()?;

        tracing::info!(
            event_name = "agent.tool.submit_order",
            items = order.product_details.len(),
            "submitting order to intake"
        );

        let confirmation = self
            .orders
            .submit_order(&order)
            .await
            .map_err(|error| ToolError::Execution(error.to_string()))?;
        Ok(Value::String(confirmation))
    }
}
