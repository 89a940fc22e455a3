use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::domain::CrmError;
use crate::sort::SortKey;
use crate::storage::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnId {
    Name,
    Email,
    Status,
    LastLogin,
    Deals,
}

impl ColumnId {
    pub const ALL: [ColumnId; 5] = [
        ColumnId::Name,
        ColumnId::Email,
        ColumnId::Status,
        ColumnId::LastLogin,
        ColumnId::Deals,
    ];
}

/// Metadata of a renderable column. Serialized as `{"id", "label", "sortKey"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub id: ColumnId,
    pub label: String,
    pub sort_key: SortKey,
}

impl ColumnDescriptor {
    fn new(id: ColumnId, label: &str, sort_key: SortKey) -> Self {
        Self {
            id,
            label: label.to_string(),
            sort_key,
        }
    }
}

pub fn default_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new(ColumnId::Name, "Name", SortKey::Name),
        ColumnDescriptor::new(ColumnId::Email, "Email", SortKey::Email),
        ColumnDescriptor::new(ColumnId::Status, "Status", SortKey::Status),
        ColumnDescriptor::new(ColumnId::LastLogin, "Last Login", SortKey::LastLogin),
        ColumnDescriptor::new(ColumnId::Deals, "Deals", SortKey::Deals),
    ]
}

/// Remove the column at `from` and reinsert it at `to`.
///
/// Returns false (and leaves `columns` untouched) if nothing moved.
pub fn move_column(columns: &mut Vec<ColumnDescriptor>, from: usize, to: usize) -> bool {
    if from == to || from >= columns.len() || to >= columns.len() {
        return false;
    }
    let moved = columns.remove(from);
    trace!("Moving column {:?} {from} -> {to}", moved.id);
    columns.insert(to, moved);
    true
}

// Every known column exactly once
fn is_complete(columns: &[ColumnDescriptor]) -> bool {
    columns.len() == ColumnId::ALL.len()
        && ColumnId::ALL
            .iter()
            .all(|id| columns.iter().filter(|c| c.id == *id).count() == 1)
}

/// Column order stored under `key`, or the default order if there is none or
/// the stored value is not usable.
pub fn load_column_order(store: &dyn KeyValueStore, key: &str) -> Vec<ColumnDescriptor> {
    let Some(raw) = store.get(key) else {
        debug!("No stored column order, using default");
        return default_columns();
    };
    match serde_json::from_str::<Vec<ColumnDescriptor>>(&raw) {
        Ok(columns) if is_complete(&columns) => {
            debug!("Restored column order {:?}", ids(&columns));
            columns
        }
        Ok(columns) => {
            warn!("Stored column order {:?} is incomplete, using default", ids(&columns));
            default_columns()
        }
        Err(e) => {
            warn!("Stored column order is malformed ({e}), using default");
            default_columns()
        }
    }
}

pub fn persist_column_order(
    store: &mut dyn KeyValueStore,
    key: &str,
    columns: &[ColumnDescriptor],
) -> Result<(), CrmError> {
    let value = serde_json::to_string(columns)?;
    store.set(key, value)
}

pub fn ids(columns: &[ColumnDescriptor]) -> Vec<ColumnId> {
    columns.iter().map(|c| c.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use ColumnId::*;

    const KEY: &str = "columnOrder";

    #[test]
    fn moving_first_to_third() {
        let mut columns = default_columns();
        assert!(move_column(&mut columns, 0, 2));
        assert_eq!(ids(&columns), vec![Email, Status, Name, LastLogin, Deals]);
    }

    #[test]
    fn moving_backwards() {
        let mut columns = default_columns();
        assert!(move_column(&mut columns, 4, 1));
        assert_eq!(ids(&columns), vec![Name, Deals, Email, Status, LastLogin]);
    }

    #[test]
    fn every_move_is_a_splice() {
        let original = ids(&default_columns());
        for from in 0..original.len() {
            for to in 0..original.len() {
                let mut columns = default_columns();
                let moved = move_column(&mut columns, from, to);
                assert_eq!(moved, from != to);

                let mut expected = original.clone();
                let id = expected.remove(from);
                expected.insert(to, id);
                assert_eq!(ids(&columns), expected, "move {from} -> {to}");
                assert!(is_complete(&columns));
            }
        }
    }

    #[test]
    fn out_of_range_move_is_ignored() {
        let mut columns = default_columns();
        assert!(!move_column(&mut columns, 1, 5));
        assert!(!move_column(&mut columns, 9, 0));
        assert_eq!(columns, default_columns());
    }

    #[test]
    fn persisted_order_is_restored() {
        let mut store = MemoryStore::default();
        let mut columns = default_columns();
        move_column(&mut columns, 3, 0);
        columns[1].label = "Full name".into();
        persist_column_order(&mut store, KEY, &columns).unwrap();

        let restored = load_column_order(&store, KEY);
        assert_eq!(restored, columns);
    }

    #[test]
    fn stored_format_matches_local_storage_layout() {
        let mut store = MemoryStore::default();
        persist_column_order(&mut store, KEY, &default_columns()[3..4]).unwrap();
        assert_eq!(
            store.get(KEY).unwrap(),
            r#"[{"id":"lastLogin","label":"Last Login","sortKey":"LAST_LOGIN"}]"#
        );
    }

    #[test]
    fn missing_or_malformed_order_falls_back() {
        let mut store = MemoryStore::default();
        assert_eq!(load_column_order(&store, KEY), default_columns());

        store.set(KEY, "not json".into()).unwrap();
        assert_eq!(load_column_order(&store, KEY), default_columns());

        store
            .set(KEY, r#"[{"id":"shoeSize","label":"Shoe","sortKey":"SHOE"}]"#.into())
            .unwrap();
        assert_eq!(load_column_order(&store, KEY), default_columns());
    }

    #[test]
    fn incomplete_order_falls_back() {
        let mut store = MemoryStore::default();
        let mut columns = default_columns();
        columns.pop();
        persist_column_order(&mut store, KEY, &columns).unwrap();
        assert_eq!(load_column_order(&store, KEY), default_columns());

        let mut duplicated = default_columns();
        duplicated[4] = duplicated[0].clone();
        persist_column_order(&mut store, KEY, &duplicated).unwrap();
        assert_eq!(load_column_order(&store, KEY), default_columns());
    }
}
