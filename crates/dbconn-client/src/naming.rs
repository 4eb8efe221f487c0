//! Entity-to-table naming hooks.

use std::fmt;

/// Maps entity and field names to table and column names.
///
/// Handed to the driver untouched; the client itself never generates SQL.
pub trait NamingStrategy: fmt::Debug + Send + Sync {
    /// Table name for an entity type such as `UserProfile`.
    fn table_name(&self, entity: &str) -> String;

    /// Column name for a field such as `createdAt`.
    fn column_name(&self, field: &str) -> String;
}

/// snake_case naming with an optional table prefix and pluralized tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnakeCaseNaming {
    /// Prefix prepended to every table name.
    pub table_prefix: String,
    /// Keep table names singular instead of appending `s`.
    pub singular_tables: bool,
}

impl SnakeCaseNaming {
    /// Create a strategy with no prefix and plural tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table prefix.
    #[must_use]
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Keep table names singular.
    #[must_use]
    pub fn singular_tables(mut self, singular: bool) -> Self {
        self.singular_tables = singular;
        self
    }
}

impl NamingStrategy for SnakeCaseNaming {
    fn table_name(&self, entity: &str) -> String {
        let mut name = format!("{}{}", self.table_prefix, to_snake_case(entity));
        if !self.singular_tables && !name.ends_with('s') {
            name.push('s');
        }
        name
    }

    fn column_name(&self, field: &str) -> String {
        to_snake_case(field)
    }
}

/// Convert `CamelCase` or `mixedCase` to `snake_case`.
///
/// Acronyms stay together: `HTTPServer` becomes `http_server`.
#[must_use]
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_uppercase() {
            out.push(c);
            continue;
        }

        let prev = i.checked_sub(1).and_then(|j| chars.get(j)).copied();
        let next = chars.get(i + 1).copied();
        let boundary = match prev {
            Some(p) if p != '_' => {
                p.is_lowercase()
                    || p.is_ascii_digit()
                    || (p.is_uppercase() && next.is_some_and(char::is_lowercase))
            }
            _ => false,
        };
        if boundary {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("UserProfile"), "user_profile");
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("userID"), "user_id");
        assert_eq!(to_snake_case("Order2Item"), "order2_item");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case(""), "");
    }

    #[test]
    fn test_table_names() {
        let naming = SnakeCaseNaming::new();
        assert_eq!(naming.table_name("UserProfile"), "user_profiles");
        assert_eq!(naming.table_name("Address"), "address");

        let prefixed = SnakeCaseNaming::new()
            .table_prefix("app_")
            .singular_tables(true);
        assert_eq!(prefixed.table_name("UserProfile"), "app_user_profile");
        assert_eq!(prefixed.column_name("lastLoginAt"), "last_login_at");
    }
}
