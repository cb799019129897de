use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error, FieldErrors,
    auth::UserID,
    database_id::GoalId,
    money::{as_f64, ratio, round_2dp},
};

/// An amount of money the user is saving towards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Goal {
    /// The ID of the goal.
    pub id: GoalId,
    /// The user that owns the goal.
    #[serde(skip)]
    pub user_id: UserID,
    /// What the user is saving for.
    pub name: String,
    /// The amount of money needed.
    pub target_amount: Decimal,
    /// The amount saved so far.
    pub current_amount: Decimal,
    /// When the user wants to reach the target.
    pub due_date: Option<Date>,
}

/// A goal together with its progress, as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalView {
    /// The goal.
    #[serde(flatten)]
    pub goal: Goal,
    /// The fraction of the target saved, between 0 and 1.
    pub progress: f64,
    /// `progress` as a percentage rounded to two decimal places.
    pub progress_percentage: f64,
}

impl From<Goal> for GoalView {
    fn from(goal: Goal) -> Self {
        let progress = progress(goal.target_amount, goal.current_amount);

        Self {
            goal,
            progress,
            progress_percentage: round_2dp(progress * 100.0),
        }
    }
}

/// The fraction of `target` that `current` covers, clamped to [0, 1].
///
/// A target of zero or less has no progress.
pub fn progress(target: Decimal, current: Decimal) -> f64 {
    if target <= Decimal::ZERO {
        return 0.0;
    }

    as_f64(ratio(current, target)).clamp(0.0, 1.0)
}

/// The validated fields of a goal.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGoal {
    /// What the user is saving for.
    pub name: String,
    /// The amount of money needed.
    pub target_amount: Decimal,
    /// The amount saved so far.
    pub current_amount: Decimal,
    /// When the user wants to reach the target.
    pub due_date: Option<Date>,
}

/// The data sent by the client to create or update a goal.
#[derive(Debug, Clone, Deserialize)]
pub struct GoalForm {
    /// What the user is saving for.
    pub name: String,
    /// The amount of money needed, at least 0.01.
    pub target_amount: Decimal,
    /// The amount saved so far, zero if omitted.
    #[serde(default)]
    pub current_amount: Option<Decimal>,
    /// When the user wants to reach the target.
    #[serde(default)]
    pub due_date: Option<Date>,
}

impl GoalForm {
    /// Check the form and apply the default current amount.
    ///
    /// # Errors
    /// Returns [Error::Validation] describing every invalid field.
    pub fn validate(self) -> Result<NewGoal, Error> {
        let current_amount = self.current_amount.unwrap_or(Decimal::ZERO);

        let mut errors = FieldErrors::new();
        errors.require_text("name", &self.name);
        errors.max_length("name", &self.name, 255);
        errors.money_amount("target_amount", self.target_amount, Decimal::new(1, 2));
        errors.money_amount("current_amount", current_amount, Decimal::ZERO);
        errors.into_result()?;

        Ok(NewGoal {
            name: self.name.trim().to_owned(),
            target_amount: self.target_amount,
            current_amount,
            due_date: self.due_date,
        })
    }
}
