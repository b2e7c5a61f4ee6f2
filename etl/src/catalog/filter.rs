use etl_config::shared::TableFilterConfig;

use crate::catalog::TableDescriptor;

/// Selects tables by schema and table name patterns.
///
/// A pattern is an exact name in which `*` matches any run of characters. `.*` is accepted as
/// an alias of `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFilter {
    schema: String,
    table: String,
}

impl TableFilter {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: normalize(schema.into()),
            table: normalize(table.into()),
        }
    }

    /// A filter accepting every table.
    pub fn all() -> Self {
        Self::new("*", "*")
    }

    pub fn matches(&self, descriptor: &TableDescriptor) -> bool {
        glob_match(&self.schema, descriptor.schema()) && glob_match(&self.table, descriptor.name())
    }

    /// Keeps the matching tables, preserving their order.
    pub fn apply(&self, tables: Vec<TableDescriptor>) -> Vec<TableDescriptor> {
        tables.into_iter().filter(|table| self.matches(table)).collect()
    }
}

impl From<&TableFilterConfig> for TableFilter {
    fn from(config: &TableFilterConfig) -> Self {
        TableFilter::new(config.schema.clone(), config.table.clone())
    }
}

fn normalize(pattern: String) -> String {
    if pattern == ".*" || pattern.is_empty() {
        "*".to_owned()
    } else {
        pattern
    }
}

fn glob_match(pattern: &str, value: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return value.is_empty();
    };

    let Some(mut rest) = value.strip_prefix(first) else {
        return false;
    };

    let remaining: Vec<&str> = parts.collect();
    let Some((last, middle)) = remaining.split_last() else {
        // No `*` at all, the pattern is an exact name.
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(index) => rest = &rest[index + part.len()..],
            None => return false,
        }
    }

    rest.len() >= last.len() && rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDescriptor;

    fn table(schema: &str, name: &str) -> TableDescriptor {
        TableDescriptor::new(
            schema,
            name,
            vec!["id".to_owned()],
            vec![ColumnDescriptor::new("id", "int")],
        )
        .unwrap()
    }

    #[test]
    fn glob_patterns() {
        assert!(glob_match("*", ""));
        assert!(glob_match("orders", "orders"));
        assert!(!glob_match("orders", "orders_archive"));
        assert!(glob_match("order*", "orders_archive"));
        assert!(glob_match("*_archive", "orders_archive"));
        assert!(glob_match("o*s*e", "orders_archive"));
        assert!(!glob_match("a*a", "a"));
    }

    #[test]
    fn filter_keeps_matching_tables_in_order() {
        let filter = TableFilter::new(".*", "c*");
        let tables = vec![table("shop", "customers"), table("shop", "orders"), table("crm", "contacts")];

        let kept: Vec<String> = filter
            .apply(tables)
            .iter()
            .map(|table| table.table_name().to_string())
            .collect();

        assert_eq!(kept, vec!["shop.customers", "crm.contacts"]);
    }
}
