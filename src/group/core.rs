use std::fmt::Display;

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{Error, FieldErrors, auth::UserID, database_id::GroupId};

/// The palette that groups and categories are drawn from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Color {
    Green,
    Purple,
    Orange,
    Gray,
    #[default]
    Blue,
    Pink,
    Red,
}

impl Color {
    const ALL: [Color; 7] = [
        Color::Green,
        Color::Purple,
        Color::Orange,
        Color::Gray,
        Color::Blue,
        Color::Pink,
        Color::Red,
    ];

    /// The lowercase name of the color.
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Green => "green",
            Color::Purple => "purple",
            Color::Orange => "orange",
            Color::Gray => "gray",
            Color::Blue => "blue",
            Color::Pink => "pink",
            Color::Red => "red",
        }
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for Color {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Color {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;

        Color::ALL
            .into_iter()
            .find(|color| color.as_str() == text)
            .ok_or_else(|| FromSqlError::Other(format!("invalid color {text:?}").into()))
    }
}

/// A named, colored bucket of categories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    /// The ID of the group.
    pub id: GroupId,
    /// The user that owns the group.
    #[serde(skip)]
    pub user_id: UserID,
    /// The display name.
    pub name: String,
    /// The group's color.
    pub color: Color,
}

/// The data sent by the client to create or update a group.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupForm {
    /// The display name.
    pub name: String,
    /// The group's color, blue if omitted.
    #[serde(default)]
    pub color: Option<Color>,
}

impl GroupForm {
    /// Check the form and return the trimmed name and the color to store.
    ///
    /// # Errors
    /// Returns [Error::Validation] if the name is blank or too long.
    pub fn validate(&self) -> Result<(&str, Color), Error> {
        let mut errors = FieldErrors::new();
        errors.require_text("name", &self.name);
        errors.max_length("name", &self.name, 255);
        errors.into_result()?;

        Ok((self.name.trim(), self.color.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Color, GroupForm};

    #[test]
    fn color_defaults_to_blue() {
        let form: GroupForm = serde_json::from_value(json!({ "name": "Bills" })).unwrap();

        assert_eq!(form.validate().unwrap(), ("Bills", Color::Blue));
    }

    #[test]
    fn rejects_colors_outside_the_palette() {
        let result =
            serde_json::from_value::<GroupForm>(json!({ "name": "Bills", "color": "teal" }));

        assert!(result.is_err());
    }
}
