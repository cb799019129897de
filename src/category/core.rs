use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    Error, FieldErrors,
    auth::UserID,
    database_id::{CategoryId, GroupId},
    group::Color,
};

/// A spending category, e.g. "Groceries".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The user that owns the category.
    #[serde(skip)]
    pub user_id: UserID,
    /// The group the category belongs to.
    pub group_id: GroupId,
    /// The display name.
    pub name: String,
    /// The category's color.
    pub color: Color,
    /// The amount the user plans to spend in this category each month.
    pub monthly_budget: Decimal,
}

/// The data needed to insert or overwrite a category.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    /// The group the category belongs to.
    pub group_id: GroupId,
    /// The display name.
    pub name: String,
    /// The category's color.
    pub color: Color,
    /// The planned monthly spend.
    pub monthly_budget: Decimal,
}

/// The data sent by the client to create or update a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryForm {
    /// The group the category belongs to.
    pub group_id: GroupId,
    /// The display name.
    pub name: String,
    /// The category's color, blue if omitted.
    #[serde(default)]
    pub color: Option<Color>,
    /// The planned monthly spend, zero if omitted.
    #[serde(default)]
    pub monthly_budget: Option<Decimal>,
}

impl CategoryForm {
    /// Check the form and convert it into a category.
    ///
    /// # Errors
    /// Returns [Error::Validation] if the name is blank or too long, or the budget is negative.
    pub fn validate(self) -> Result<NewCategory, Error> {
        let monthly_budget = self.monthly_budget.unwrap_or(Decimal::ZERO);

        let mut errors = FieldErrors::new();
        errors.require_text("name", &self.name);
        errors.max_length("name", &self.name, 255);
        errors.money_amount("monthly_budget", monthly_budget, Decimal::ZERO);
        errors.into_result()?;

        Ok(NewCategory {
            group_id: self.group_id,
            name: self.name.trim().to_owned(),
            color: self.color.unwrap_or_default(),
            monthly_budget,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::{Error, group::Color};

    use super::CategoryForm;

    #[test]
    fn missing_budget_defaults_to_zero() {
        let form: CategoryForm =
            serde_json::from_value(json!({ "group_id": 1, "name": " Groceries " })).unwrap();

        let category = form.validate().unwrap();

        assert_eq!(category.monthly_budget, Decimal::ZERO);
        assert_eq!(category.color, Color::Blue);
        assert_eq!(category.name, "Groceries");
    }

    #[test]
    fn negative_budget_is_rejected() {
        let form: CategoryForm = serde_json::from_value(
            json!({ "group_id": 1, "name": "Groceries", "monthly_budget": "-5" }),
        )
        .unwrap();

        let Err(Error::Validation(errors)) = form.validate() else {
            panic!("expected a validation error");
        };
        assert!(errors.get("monthly_budget").is_some());
    }

    #[test]
    fn fraction_of_a_cent_budget_is_rejected() {
        let form: CategoryForm = serde_json::from_value(json!({
            "group_id": 1,
            "name": "Groceries",
            "monthly_budget": "0.0000000000000000000000000001"
        }))
        .unwrap();

        let Err(Error::Validation(errors)) = form.validate() else {
            panic!("expected a validation error");
        };
        assert_eq!(
            errors.get("monthly_budget"),
            Some("The monthly_budget field must have at most 2 decimal places.")
        );
    }
}
