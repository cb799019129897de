//! Savings goals and their progress.

mod core;
mod db;
mod endpoints;

pub use core::{Goal, GoalForm, GoalView, NewGoal};
pub use db::{create_goal, create_goal_table, delete_goal, list_goals, top_goals, update_goal};
pub use endpoints::{
    create_goal_endpoint, delete_goal_endpoint, get_goals_endpoint, update_goal_endpoint,
};
