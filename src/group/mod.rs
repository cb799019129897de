//! Colored buckets that categories are organised into.

mod core;
mod db;
mod endpoints;

pub use core::{Color, Group, GroupForm};
pub use db::{
    create_group, create_group_table, delete_group, get_group, list_groups, update_group,
};
pub use endpoints::{
    create_group_endpoint, delete_group_endpoint, get_groups_endpoint, update_group_endpoint,
};
