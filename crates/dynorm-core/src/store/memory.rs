//! In-memory store.

use std::collections::HashMap;

use dynorm_proto::{Item, Value};
use parking_lot::RwLock;
use tracing::trace;

use super::expression::{self, Comparator, EvalContext, Expr, Operand};
use super::{Cursor, NameMap, Page, ScanRequest, StoreClient, StoreError, TargetedRead, ValueMap};
use crate::catalog::KeySchema;

/// Default number of records examined per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug)]
struct MemoryTable {
    schema: KeySchema,
    items: Vec<Item>,
}

/// A [`StoreClient`] backed by in-process tables.
///
/// Records are kept in insertion order. Each page examines at most
/// `page_size` records, so a page can come back empty while a cursor remains.
/// Secondary indexes are sparse: records missing an index key attribute are
/// invisible through that index.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, MemoryTable>>,
    page_size: usize,
}

impl MemoryStore {
    /// Create an empty store with the default page size.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create an empty store examining `page_size` records per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Create a table keyed by `schema`. Recreating a table empties it.
    pub fn create_table(&self, name: impl Into<String>, schema: KeySchema) {
        self.tables.write().insert(
            name.into(),
            MemoryTable {
                schema,
                items: Vec::new(),
            },
        );
    }

    /// Insert or replace a record by its primary key.
    pub fn put(&self, table: &str, item: Item) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let table_data = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::Rejected(format!("table `{table}` not found")))?;

        let hash = &table_data.schema.hash_key;
        if item.get(hash).map_or(true, Value::is_null) {
            return Err(StoreError::Rejected(format!(
                "record is missing hash key `{hash}`"
            )));
        }

        let key_of = |record: &Item| {
            (
                record.get(&table_data.schema.hash_key).cloned(),
                table_data
                    .schema
                    .sort_key
                    .as_ref()
                    .and_then(|s| record.get(s).cloned()),
            )
        };
        let key = key_of(&item);
        match table_data.items.iter().position(|r| key_of(r) == key) {
            Some(pos) => table_data.items[pos] = item,
            None => table_data.items.push(item),
        }
        Ok(())
    }

    /// Number of records in a table.
    pub fn item_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, |t| t.items.len())
    }

    #[allow(clippy::too_many_arguments)]
    fn read_page(
        &self,
        table: &str,
        index: Option<&str>,
        key_condition: Option<&str>,
        filter: Option<&str>,
        names: &NameMap,
        values: &ValueMap,
        cursor: Option<&Cursor>,
    ) -> Result<Page, StoreError> {
        let tables = self.tables.read();
        let table_data = tables
            .get(table)
            .ok_or_else(|| StoreError::Rejected(format!("table `{table}` not found")))?;

        let (hash_key, sort_key) = match index {
            Some(name) => {
                let idx = table_data.schema.index(name).ok_or_else(|| {
                    StoreError::Rejected(format!("index `{name}` not found on `{table}`"))
                })?;
                (idx.hash_key.as_str(), Some(idx.sort_key.as_str()))
            }
            None => (
                table_data.schema.hash_key.as_str(),
                table_data.schema.sort_key.as_deref(),
            ),
        };

        let key_expr = key_condition
            .map(|kc| {
                let expr = expression::parse(kc).map_err(rejected)?;
                check_key_condition(&expr, names, hash_key, sort_key)?;
                Ok::<_, StoreError>(expr)
            })
            .transpose()?;
        let filter_expr = filter.map(expression::parse).transpose().map_err(rejected)?;

        let start = decode_cursor(cursor)?;
        let end = start.saturating_add(self.page_size).min(table_data.items.len());

        let mut items = Vec::new();
        for item in table_data.items.get(start..end).unwrap_or_default() {
            if index.is_some() && !has_keys(item, hash_key, sort_key) {
                continue;
            }
            let ctx = EvalContext::new(item, names, values);
            if let Some(expr) = &key_expr {
                if !ctx.evaluate(expr).map_err(rejected)? {
                    continue;
                }
            }
            if let Some(expr) = &filter_expr {
                if !ctx.evaluate(expr).map_err(rejected)? {
                    continue;
                }
            }
            items.push(item.clone());
        }

        trace!(
            table,
            index = ?index,
            start,
            end,
            matched = items.len(),
            "memory store page"
        );

        if end < table_data.items.len() {
            Ok(Page::with_cursor(
                items,
                Cursor::new((end as u64).to_be_bytes().to_vec()),
            ))
        } else {
            Ok(Page::last(items))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreClient for MemoryStore {
    fn targeted_read(&self, request: &TargetedRead<'_>) -> Result<Page, StoreError> {
        self.read_page(
            request.table,
            request.index,
            Some(request.key_condition),
            request.filter,
            request.names,
            request.values,
            request.cursor,
        )
    }

    fn full_scan(&self, request: &ScanRequest<'_>) -> Result<Page, StoreError> {
        self.read_page(
            request.table,
            None,
            None,
            request.filter,
            request.names,
            request.values,
            request.cursor,
        )
    }
}

fn rejected(err: expression::ExpressionError) -> StoreError {
    StoreError::Rejected(err.to_string())
}

fn decode_cursor(cursor: Option<&Cursor>) -> Result<usize, StoreError> {
    let Some(cursor) = cursor else {
        return Ok(0);
    };
    let bytes: [u8; 8] = cursor
        .as_bytes()
        .try_into()
        .map_err(|_| StoreError::Rejected(format!("malformed cursor {cursor}")))?;
    usize::try_from(u64::from_be_bytes(bytes))
        .map_err(|_| StoreError::Rejected(format!("malformed cursor {cursor}")))
}

fn has_keys(item: &Item, hash_key: &str, sort_key: Option<&str>) -> bool {
    let present = |name: &str| item.get(name).is_some_and(|v| !v.is_null());
    present(hash_key) && sort_key.map_or(true, present)
}

/// A key condition is an equality on the hash attribute, optionally ANDed with
/// one comparison or range on the sort attribute.
fn check_key_condition(
    expr: &Expr,
    names: &NameMap,
    hash_key: &str,
    sort_key: Option<&str>,
) -> Result<(), StoreError> {
    let resolve = |operand: &Operand| -> Result<String, StoreError> {
        match operand {
            Operand::Path(p) if p.starts_with('#') => names
                .get(p)
                .cloned()
                .ok_or_else(|| StoreError::Rejected(format!("unresolved attribute name `{p}`"))),
            Operand::Path(p) => Ok(p.clone()),
            Operand::Value(v) => Err(StoreError::Rejected(format!(
                "key condition must name an attribute on the left, found `{v}`"
            ))),
        }
    };

    let mut hash_seen = false;
    let mut sort_seen = false;
    for part in expr.conjuncts() {
        match part {
            Expr::Compare { left, op, right: Operand::Value(_) } => {
                let attr = resolve(left)?;
                if attr == hash_key && *op == Comparator::Eq && !hash_seen {
                    hash_seen = true;
                } else if Some(attr.as_str()) == sort_key && *op != Comparator::Ne && !sort_seen {
                    sort_seen = true;
                } else {
                    return Err(StoreError::Rejected(format!(
                        "`{attr} {op}` is not a valid key condition"
                    )));
                }
            }
            Expr::Between { value, low: Operand::Value(_), high: Operand::Value(_) } => {
                let attr = resolve(value)?;
                if Some(attr.as_str()) != sort_key || sort_seen {
                    return Err(StoreError::Rejected(format!(
                        "BETWEEN on `{attr}` is not a valid key condition"
                    )));
                }
                sort_seen = true;
            }
            other => {
                return Err(StoreError::Rejected(format!(
                    "unsupported key condition {other:?}"
                )))
            }
        }
    }

    if hash_seen {
        Ok(())
    } else {
        Err(StoreError::Rejected(format!(
            "key condition must test `{hash_key}` for equality"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ScalarType;

    fn item(realm: &str, id: &str, role: Option<&str>) -> Item {
        let mut item = Item::new();
        item.insert("realm".into(), realm.into());
        item.insert("id".into(), id.into());
        if let Some(role) = role {
            item.insert("role".into(), role.into());
        }
        item
    }

    fn store(page_size: usize) -> MemoryStore {
        let store = MemoryStore::with_page_size(page_size);
        store.create_table(
            "people",
            KeySchema::new("realm", ScalarType::String)
                .with_sort_key("id", ScalarType::String)
                .with_local_index("role", ScalarType::String),
        );
        store.put("people", item("beatles", "1", Some("leaders"))).unwrap();
        store.put("people", item("beatles", "2", None)).unwrap();
        store.put("people", item("stones", "1", Some("leaders"))).unwrap();
        store
    }

    fn tables() -> (NameMap, ValueMap) {
        let mut names = NameMap::new();
        names.insert("#R".into(), "realm".into());
        names.insert("#I".into(), "id".into());
        names.insert("#RO".into(), "role".into());
        let mut values = ValueMap::new();
        values.insert(":realm".into(), "beatles".into());
        values.insert(":id".into(), "1".into());
        values.insert(":role".into(), "leaders".into());
        (names, values)
    }

    fn drain(store: &MemoryStore, request: TargetedRead<'_>) -> Vec<Item> {
        let mut items = Vec::new();
        let mut cursor: Option<Cursor> = None;
        loop {
            let page = store
                .targeted_read(&TargetedRead {
                    cursor: cursor.as_ref(),
                    ..request
                })
                .unwrap();
            items.extend(page.items);
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => return items,
            }
        }
    }

    #[test]
    fn test_put_replaces_by_key() {
        let store = store(10);
        store.put("people", item("beatles", "1", Some("backer"))).unwrap();
        assert_eq!(store.item_count("people"), 3);
    }

    #[test]
    fn test_put_requires_hash_key() {
        let store = store(10);
        let mut record = Item::new();
        record.insert("id".into(), "9".into());
        assert!(matches!(
            store.put("people", record),
            Err(StoreError::Rejected(_))
        ));
    }

    #[test]
    fn test_targeted_read_pages() {
        let store = store(1);
        let (names, values) = tables();
        let request = TargetedRead {
            table: "people",
            index: None,
            key_condition: "#R = :realm",
            filter: None,
            names: &names,
            values: &values,
            cursor: None,
        };
        let first = store.targeted_read(&request).unwrap();
        assert_eq!(first.items.len(), 1);
        assert!(first.cursor.is_some());

        assert_eq!(drain(&store, request).len(), 2);
    }

    #[test]
    fn test_sparse_index() {
        let store = store(10);
        let (names, values) = tables();
        let page = store
            .targeted_read(&TargetedRead {
                table: "people",
                index: Some("roleLocalIndex"),
                key_condition: "#R = :realm AND #RO = :role",
                filter: None,
                names: &names,
                values: &values,
                cursor: None,
            })
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0]["id"], Value::from("1"));
    }

    #[test]
    fn test_invalid_key_conditions_rejected() {
        let store = store(10);
        let (names, values) = tables();
        for key_condition in [
            "#I = :id",
            "#R = :realm AND #RO = :role",
            "#R = :realm OR #I = :id",
            "#R < :realm",
        ] {
            let result = store.targeted_read(&TargetedRead {
                table: "people",
                index: None,
                key_condition,
                filter: None,
                names: &names,
                values: &values,
                cursor: None,
            });
            assert!(
                matches!(result, Err(StoreError::Rejected(_))),
                "accepted {key_condition}"
            );
        }
    }

    #[test]
    fn test_scan_with_filter() {
        let store = store(2);
        let (names, values) = tables();
        let request = ScanRequest {
            table: "people",
            filter: Some("#I = :id"),
            names: &names,
            values: &values,
            cursor: None,
        };
        let first = store.full_scan(&request).unwrap();
        assert_eq!(first.items.len(), 1);
        let second = store
            .full_scan(&ScanRequest {
                cursor: first.cursor.as_ref(),
                ..request
            })
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(second.cursor.is_none());
    }

    #[test]
    fn test_unknown_table_and_bad_cursor() {
        let store = store(10);
        let (names, values) = tables();
        let scan = ScanRequest {
            table: "nope",
            filter: None,
            names: &names,
            values: &values,
            cursor: None,
        };
        assert!(matches!(store.full_scan(&scan), Err(StoreError::Rejected(_))));

        let cursor = Cursor::new(vec![1, 2]);
        let scan = ScanRequest {
            table: "people",
            cursor: Some(&cursor),
            ..scan
        };
        assert!(matches!(store.full_scan(&scan), Err(StoreError::Rejected(_))));
    }
}
