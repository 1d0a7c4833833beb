//! Record access.
//!
//! Rows are opaque to the engine: every field read and write goes through
//! the `Record` trait, so the same code paths serve rows backed by a plain
//! field map and rows backed by host accessor functions. The strategy is
//! chosen per record at ingestion time.

use rustc_hash::FxHashMap;

use crate::address::ColumnKey;
use crate::value::FieldValue;

/// Stable identifier of a row's underlying item, independent of the row's
/// current position in the dataset.
pub type ItemId = u64;

/// Uniform field access over map-backed and accessor-backed rows.
pub trait Record {
    fn item_id(&self) -> ItemId;

    /// Read a field. Unknown columns read as `Empty`.
    fn get_field(&self, column: &ColumnKey) -> FieldValue;

    /// Write a field. Unknown columns are ignored.
    fn set_field(&mut self, column: &ColumnKey, value: FieldValue);
}

// =============================================================================
// MapRecord: plain field map
// =============================================================================

/// Record holding its fields directly in a map.
#[derive(Debug, Clone)]
pub struct MapRecord {
    item_id: ItemId,
    fields: FxHashMap<ColumnKey, FieldValue>,
}

impl MapRecord {
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            fields: FxHashMap::default(),
        }
    }

    pub fn with_field(mut self, column: impl Into<ColumnKey>, value: FieldValue) -> Self {
        self.fields.insert(column.into(), value);
        self
    }
}

impl Record for MapRecord {
    fn item_id(&self) -> ItemId {
        self.item_id
    }

    fn get_field(&self, column: &ColumnKey) -> FieldValue {
        self.fields.get(column).cloned().unwrap_or(FieldValue::Empty)
    }

    fn set_field(&mut self, column: &ColumnKey, value: FieldValue) {
        self.fields.insert(column.clone(), value);
    }
}

// =============================================================================
// AccessorRecord: host getter/setter functions over an opaque payload
// =============================================================================

type Getter<T> = Box<dyn Fn(&T) -> FieldValue>;
type Setter<T> = Box<dyn FnMut(&mut T, FieldValue)>;

/// Record backed by per-column accessor functions over a host payload.
///
/// Columns without a registered accessor read as `Empty` and ignore
/// writes, matching `MapRecord`'s unknown-column behavior.
pub struct AccessorRecord<T> {
    item_id: ItemId,
    payload: T,
    getters: FxHashMap<ColumnKey, Getter<T>>,
    setters: FxHashMap<ColumnKey, Setter<T>>,
}

impl<T> AccessorRecord<T> {
    pub fn new(item_id: ItemId, payload: T) -> Self {
        Self {
            item_id,
            payload,
            getters: FxHashMap::default(),
            setters: FxHashMap::default(),
        }
    }

    pub fn with_accessor(
        mut self,
        column: impl Into<ColumnKey>,
        get: impl Fn(&T) -> FieldValue + 'static,
        set: impl FnMut(&mut T, FieldValue) + 'static,
    ) -> Self {
        let column = column.into();
        self.getters.insert(column.clone(), Box::new(get));
        self.setters.insert(column, Box::new(set));
        self
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }
}

impl<T> Record for AccessorRecord<T> {
    fn item_id(&self) -> ItemId {
        self.item_id
    }

    fn get_field(&self, column: &ColumnKey) -> FieldValue {
        match self.getters.get(column) {
            Some(get) => get(&self.payload),
            None => FieldValue::Empty,
        }
    }

    fn set_field(&mut self, column: &ColumnKey, value: FieldValue) {
        if let Some(set) = self.setters.get_mut(column) {
            set(&mut self.payload, value);
        }
    }
}

// =============================================================================
// RowSet: ordered records with an item-id index
// =============================================================================

/// Ordered collection of records with an item-id lookup.
///
/// Row indexes are positional; `remove` shifts later rows down and the
/// item-id index is rebuilt to match. Item ids must be unique.
pub struct RowSet {
    rows: Vec<Box<dyn Record>>,
    id_index: FxHashMap<ItemId, usize>,
}

impl Default for RowSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RowSet {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            id_index: FxHashMap::default(),
        }
    }

    pub fn from_records(rows: Vec<Box<dyn Record>>) -> Self {
        let mut set = Self {
            rows,
            id_index: FxHashMap::default(),
        };
        set.rebuild_index();
        set
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, record: Box<dyn Record>) {
        self.id_index.insert(record.item_id(), self.rows.len());
        self.rows.push(record);
    }

    pub fn get(&self, row: usize) -> Option<&dyn Record> {
        self.rows.get(row).map(|r| r.as_ref())
    }

    pub fn get_mut(&mut self, row: usize) -> Option<&mut dyn Record> {
        self.rows.get_mut(row).map(|r| r.as_mut() as &mut dyn Record)
    }

    /// Read a field; missing rows and unknown columns read as `Empty`.
    pub fn value(&self, row: usize, column: &ColumnKey) -> FieldValue {
        match self.rows.get(row) {
            Some(record) => record.get_field(column),
            None => FieldValue::Empty,
        }
    }

    /// Write a field. Returns false when the row does not exist.
    pub fn set_value(&mut self, row: usize, column: &ColumnKey, value: FieldValue) -> bool {
        match self.rows.get_mut(row) {
            Some(record) => {
                record.set_field(column, value);
                true
            }
            None => false,
        }
    }

    pub fn item_id(&self, row: usize) -> Option<ItemId> {
        self.rows.get(row).map(|r| r.item_id())
    }

    pub fn row_of_item(&self, item_id: ItemId) -> Option<usize> {
        self.id_index.get(&item_id).copied()
    }

    /// Remove a row, shifting later rows down one index.
    pub fn remove(&mut self, row: usize) -> Option<Box<dyn Record>> {
        if row >= self.rows.len() {
            return None;
        }
        let removed = self.rows.remove(row);
        self.rebuild_index();
        Some(removed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Record> {
        self.rows.iter().map(|r| r.as_ref())
    }

    fn rebuild_index(&mut self) {
        self.id_index = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| (r.item_id(), i))
            .collect();
    }
}
