//! Database operations for rules.

use rusqlite::{Connection, Row};

use crate::{
    Error,
    account::{AccountKind, Accountable},
    auth::UserID,
    database_id::RuleId,
    rule::{Rule, core::RuleFields},
};

/// Initialize the rule table and indexes.
///
/// Rules are deleted with the category they assign.
pub fn create_rule_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS rule (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            accountable_type TEXT NOT NULL,
            accountable_id INTEGER NOT NULL,
            search_string TEXT NOT NULL,
            replace_string TEXT NOT NULL DEFAULT '',
            category_id INTEGER NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES category(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_rule_user_id ON rule(user_id);
        CREATE INDEX IF NOT EXISTS idx_rule_accountable
            ON rule(accountable_type, accountable_id);",
    )?;

    Ok(())
}

/// Create a rule for one of the user's accounts.
///
/// The caller must check that the account and category belong to `user_id`.
pub(crate) fn create_rule(
    user_id: UserID,
    account: Accountable,
    fields: &RuleFields,
    connection: &Connection,
) -> Result<Rule, Error> {
    connection.execute(
        "INSERT INTO rule (user_id, accountable_type, accountable_id, search_string, replace_string, category_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            user_id.as_i64(),
            account.kind,
            account.id,
            &fields.search_string,
            &fields.replace_string,
            fields.category_id,
        ),
    )?;

    Ok(Rule {
        id: connection.last_insert_rowid(),
        account,
        search_string: fields.search_string.clone(),
        replace_string: fields.replace_string.clone(),
        category_id: fields.category_id,
    })
}

/// Retrieve one of the user's rules.
///
/// # Errors
/// Returns [Error::NotFound] if the rule does not exist or belongs to another user.
pub fn get_rule(rule_id: RuleId, user_id: UserID, connection: &Connection) -> Result<Rule, Error> {
    connection
        .prepare(
            "SELECT id, accountable_type, accountable_id, search_string, replace_string, category_id
            FROM rule WHERE id = ?1 AND user_id = ?2",
        )?
        .query_row((rule_id, user_id.as_i64()), map_row)
        .map_err(|error| error.into())
}

/// Retrieve the user's rules across all accounts, newest first.
pub fn list_rules(user_id: UserID, connection: &Connection) -> Result<Vec<Rule>, Error> {
    connection
        .prepare(
            "SELECT id, accountable_type, accountable_id, search_string, replace_string, category_id
            FROM rule WHERE user_id = ?1 ORDER BY id DESC",
        )?
        .query_map([user_id.as_i64()], map_row)?
        .map(|maybe_rule| maybe_rule.map_err(|error| error.into()))
        .collect()
}

/// Retrieve the rules of an account in the order they are evaluated, oldest first.
pub fn get_account_rules(
    account: Accountable,
    connection: &Connection,
) -> Result<Vec<Rule>, Error> {
    connection
        .prepare(
            "SELECT id, accountable_type, accountable_id, search_string, replace_string, category_id
            FROM rule WHERE accountable_type = ?1 AND accountable_id = ?2 ORDER BY id ASC",
        )?
        .query_map((account.kind, account.id), map_row)?
        .map(|maybe_rule| maybe_rule.map_err(|error| error.into()))
        .collect()
}

/// Overwrite the search string, replace string and category of a rule.
///
/// # Errors
/// Returns [Error::UpdateMissingRule] if the rule does not exist or belongs to another user.
pub(crate) fn update_rule(
    rule_id: RuleId,
    user_id: UserID,
    fields: &RuleFields,
    connection: &Connection,
) -> Result<Rule, Error> {
    let rows_affected = connection.execute(
        "UPDATE rule SET search_string = ?1, replace_string = ?2, category_id = ?3
        WHERE id = ?4 AND user_id = ?5",
        (
            &fields.search_string,
            &fields.replace_string,
            fields.category_id,
            rule_id,
            user_id.as_i64(),
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingRule);
    }

    get_rule(rule_id, user_id, connection)
}

/// Delete one of the user's rules.
///
/// # Errors
/// Returns [Error::DeleteMissingRule] if the rule does not exist or belongs to another user.
pub fn delete_rule(rule_id: RuleId, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM rule WHERE id = ?1 AND user_id = ?2",
        (rule_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingRule);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Rule, rusqlite::Error> {
    let kind: AccountKind = row.get(1)?;

    Ok(Rule {
        id: row.get(0)?,
        account: Accountable::new(kind, row.get(2)?),
        search_string: row.get(3)?,
        replace_string: row.get(4)?,
        category_id: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::{
        Error,
        account::AccountDetails,
        category::delete_category,
        rule::core::RuleFields,
        test_utils::{
            get_test_connection, insert_test_account, insert_test_category, insert_test_user,
        },
    };

    use super::{create_rule, delete_rule, get_account_rules, get_rule, list_rules, update_rule};

    fn fields(search_string: &str, category_id: i64) -> RuleFields {
        RuleFields {
            search_string: search_string.to_owned(),
            replace_string: String::new(),
            category_id,
        }
    }

    fn cash_details() -> AccountDetails {
        AccountDetails::CashAccount {
            subtype: "checking".to_owned(),
            account_number: None,
            balance: Decimal::ZERO,
        }
    }

    #[test]
    fn account_rules_are_oldest_first_and_list_is_newest_first() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn);
        let account = insert_test_account(user.id, cash_details(), &conn).accountable();
        let category = insert_test_category(user.id, "Food", &conn);
        let first = create_rule(user.id, account, &fields("a", category.id), &conn).unwrap();
        let second = create_rule(user.id, account, &fields("b", category.id), &conn).unwrap();

        let evaluated = get_account_rules(account, &conn).unwrap();
        let listed = list_rules(user.id, &conn).unwrap();

        assert_eq!(evaluated, [first.clone(), second.clone()]);
        assert_eq!(listed, [second, first]);
    }

    #[test]
    fn other_users_rule_is_not_found() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        let intruder = insert_test_user(&conn);
        let account = insert_test_account(owner.id, cash_details(), &conn).accountable();
        let category = insert_test_category(owner.id, "Food", &conn);
        let rule = create_rule(owner.id, account, &fields("a", category.id), &conn).unwrap();

        assert_eq!(get_rule(rule.id, intruder.id, &conn), Err(Error::NotFound));
        assert_eq!(
            update_rule(rule.id, intruder.id, &fields("b", category.id), &conn),
            Err(Error::UpdateMissingRule)
        );
        assert_eq!(
            delete_rule(rule.id, intruder.id, &conn),
            Err(Error::DeleteMissingRule)
        );
    }

    #[test]
    fn deleting_category_deletes_its_rules() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn);
        let account = insert_test_account(user.id, cash_details(), &conn).accountable();
        let category = insert_test_category(user.id, "Food", &conn);
        create_rule(user.id, account, &fields("a", category.id), &conn).unwrap();

        delete_category(category.id, user.id, &conn).unwrap();

        assert_eq!(list_rules(user.id, &conn).unwrap(), []);
    }
}
