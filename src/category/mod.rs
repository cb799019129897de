//! Spending categories with a monthly budget, organised into groups.

mod core;
mod db;
mod endpoints;

pub use core::{Category, CategoryForm, NewCategory};
pub use db::{
    category_names, create_category, create_category_table, delete_category, get_category,
    list_categories, update_category,
};
pub use endpoints::{
    create_category_endpoint, delete_category_endpoint, get_categories_endpoint,
    update_category_endpoint,
};
