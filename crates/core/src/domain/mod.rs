pub mod category;
pub mod customer;
pub mod inventory;
pub mod order;
pub mod product;
pub mod purchase;
pub mod quotation;
pub mod supplier;
