pub mod conversation;
pub mod product;
