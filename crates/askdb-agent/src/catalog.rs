use askdb_protocol::{ColumnInfo, TableRef};
use askdb_sql::same_identifier;
use tracing::{info, warn};

use crate::client::{ClientError, ToolClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub table: TableRef,
    pub columns: Vec<ColumnInfo>,
}

/// Table and column metadata for the session.
///
/// Fetched once at startup and read-only afterwards. Table names are unique
/// case-insensitively; lookups ignore case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// `list_tables` once, then `list_columns` for each table.
    ///
    /// A column list that cannot be decoded is recorded as empty; transport
    /// failures abort the load.
    pub async fn load(client: &ToolClient) -> Result<Self, ClientError> {
        let tables = client.list_tables().await?;
        let mut catalog = Catalog::default();
        for table in tables {
            if catalog.get(&table.table).is_some() {
                warn!(schema = %table.schema, table = %table.table, "duplicate table name; keeping the first");
                continue;
            }
            let columns = match client.list_columns(&table.table).await {
                Ok(columns) => columns,
                Err(ClientError::Protocol(e)) => {
                    warn!(table = %table.table, error = %e, "undecodable column list; treating as empty");
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            catalog.insert(table, columns);
        }
        info!(tables = catalog.len(), "schema catalog loaded");
        Ok(catalog)
    }

    /// Add a table unless one with the same name (ignoring case) is present.
    /// Returns whether it was added.
    pub fn insert(&mut self, table: TableRef, columns: Vec<ColumnInfo>) -> bool {
        if self.get(&table.table).is_some() {
            return false;
        }
        self.entries.push(CatalogEntry { table, columns });
        true
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| same_identifier(&e.table.table, name))
    }

    /// Catalog spelling of `name`, if the table exists.
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        self.get(name).map(|e| e.table.table.as_str())
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.table.table.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
