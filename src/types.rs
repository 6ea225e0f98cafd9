//! Core types for board items.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

/// Identifier of an item, either server-assigned or client-temporary.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Create an id from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        ItemId(id.into())
    }

    /// Borrow the string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id was minted locally with the given prefix.
    pub fn is_temporary(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId(s)
    }
}

/// String-encoded rank used to sort items within a lane.
///
/// Integer ranks (an optional `-` and any number of digits) compare
/// numerically and sort before anything else; other ranks compare as
/// plain strings.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(pub String);

impl Rank {
    /// Create a rank from its string form.
    pub fn new(rank: impl Into<String>) -> Self {
        Rank(rank.into())
    }

    /// Create a rank from an integer.
    pub fn from_int(n: i64) -> Self {
        Rank(n.to_string())
    }

    /// Integer value of the rank, if it is an integer that fits in an `i64`.
    pub fn as_int(&self) -> Option<i64> {
        self.numeric()?;
        self.0.parse().ok()
    }

    /// Whether the rank is an integer of any length.
    pub fn is_integer(&self) -> bool {
        self.numeric().is_some()
    }

    /// The rank to use after `max`, or `1` when there is nothing to follow.
    pub fn after(max: Option<&Rank>) -> Self {
        max.map_or_else(|| Rank::from_int(1), Rank::successor)
    }

    /// A rank that sorts strictly after this one.
    ///
    /// Integers are incremented in decimal, so there is no overflow. Other
    /// ranks get an `a` suffix, which keeps them non-integer.
    pub fn successor(&self) -> Rank {
        match self.numeric() {
            Some((false, magnitude)) => Rank(increment(magnitude)),
            Some((true, magnitude)) => match decrement(magnitude) {
                zero if zero.is_empty() => Rank::from_int(0),
                rest => Rank(format!("-{rest}")),
            },
            None => Rank(format!("{}a", self.0)),
        }
    }

    /// Borrow the string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sign and magnitude of an integer rank. The magnitude has no leading
    /// zeros, so zero is `(false, "")`.
    fn numeric(&self) -> Option<(bool, &str)> {
        let (negative, digits) = match self.0.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, self.0.as_str()),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let magnitude = digits.trim_start_matches('0');
        Some((negative && !magnitude.is_empty(), magnitude))
    }
}

fn cmp_magnitude(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn cmp_numeric(a: (bool, &str), b: (bool, &str)) -> Ordering {
    match (a.0, b.0) {
        (false, false) => cmp_magnitude(a.1, b.1),
        (true, true) => cmp_magnitude(b.1, a.1),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
    }
}

/// Add one to a run of decimal digits.
fn increment(digits: &str) -> String {
    let mut out: Vec<char> = digits.chars().collect();
    let mut carry = true;
    for d in out.iter_mut().rev() {
        if *d == '9' {
            *d = '0';
        } else {
            *d = char::from(*d as u8 + 1);
            carry = false;
            break;
        }
    }
    if carry {
        out.insert(0, '1');
    }
    out.into_iter().collect()
}

/// Subtract one from a non-zero run of decimal digits, dropping leading zeros.
fn decrement(digits: &str) -> String {
    let mut out: Vec<char> = digits.chars().collect();
    for d in out.iter_mut().rev() {
        if *d == '0' {
            *d = '9';
        } else {
            *d = char::from(*d as u8 - 1);
            break;
        }
    }
    let out: String = out.into_iter().collect();
    out.trim_start_matches('0').to_string()
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => cmp_numeric(a, b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rank({})", self.0)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Rank {
    fn from(s: &str) -> Self {
        Rank(s.to_string())
    }
}

impl From<String> for Rank {
    fn from(s: String) -> Self {
        Rank(s)
    }
}

/// Columns kept in typed fields, never in a payload map.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "order", "status_group"];

fn is_reserved(key: &str) -> bool {
    RESERVED_FIELDS.contains(&key)
}

/// Text of a scalar column value.
fn column_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn without_reserved(fields: Map<String, Value>) -> Map<String, Value> {
    fields.into_iter().filter(|(key, _)| !is_reserved(key)).collect()
}

/// A single item on a board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderedItem {
    pub id: ItemId,

    /// Sort key within the lane.
    pub order: Rank,

    /// Lane (status column) the item belongs to.
    pub status_group: String,

    /// Everything else the backend returns for the row.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl OrderedItem {
    /// Create an item with an empty payload.
    pub fn new(id: impl Into<ItemId>, order: impl Into<Rank>, status_group: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            order: order.into(),
            status_group: status_group.into(),
            payload: Map::new(),
        }
    }

    /// Set a column. `id`, `order` and `status_group` go to the typed
    /// fields (non-scalar values for them are ignored); other keys land in
    /// the payload.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        match key.as_str() {
            "id" => {
                if let Some(id) = column_text(&value) {
                    self.id = ItemId(id);
                }
            }
            "order" => {
                if let Some(order) = column_text(&value) {
                    self.order = Rank(order);
                }
            }
            "status_group" => {
                if let Some(group) = column_text(&value) {
                    self.status_group = group;
                }
            }
            _ => {
                self.payload.insert(key, value);
            }
        }
        self
    }

    /// Apply a patch, returning the patched copy.
    pub fn patched(&self, patch: &ItemPatch) -> Self {
        let mut item = self.clone();
        if let Some(ref order) = patch.order {
            item.order = order.clone();
        }
        if let Some(ref group) = patch.status_group {
            item.status_group = group.clone();
        }
        for (key, value) in &patch.fields {
            if !is_reserved(key) {
                item.payload.insert(key.clone(), value.clone());
            }
        }
        item
    }
}

/// Request to create an item.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub status_group: String,

    /// Explicit rank; `None` appends to the end of the lane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Rank>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ItemDraft {
    /// Draft for a new item in `status_group`.
    pub fn new(status_group: impl Into<String>) -> Self {
        Self {
            status_group: status_group.into(),
            ..Default::default()
        }
    }

    /// Request an explicit rank.
    pub fn with_order(mut self, order: impl Into<Rank>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Set a column. `order` and `status_group` go to the typed fields;
    /// `id` is dropped since the store assigns it.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        match key.as_str() {
            "id" => {}
            "order" => {
                if let Some(order) = column_text(&value) {
                    self.order = Some(Rank(order));
                }
            }
            "status_group" => {
                if let Some(group) = column_text(&value) {
                    self.status_group = group;
                }
            }
            _ => {
                self.fields.insert(key, value);
            }
        }
        self
    }

    /// Materialize the draft as an item under the given id.
    pub fn into_item(self, id: ItemId, order: Rank) -> OrderedItem {
        OrderedItem {
            id,
            order,
            status_group: self.status_group,
            payload: without_reserved(self.fields),
        }
    }
}

/// Partial update of an item. Payload fields are merged key by key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Rank>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_group: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ItemPatch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rank.
    pub fn order(mut self, order: impl Into<Rank>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Move to another lane.
    pub fn status_group(mut self, group: impl Into<String>) -> Self {
        self.status_group = Some(group.into());
        self
    }

    /// Set a column. `order` and `status_group` go to the typed fields;
    /// `id` is dropped since ids never change.
    pub fn field(self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        match key.as_str() {
            "id" => self,
            "order" => match column_text(&value) {
                Some(order) => self.order(order),
                None => self,
            },
            "status_group" => match column_text(&value) {
                Some(group) => self.status_group(group),
                None => self,
            },
            _ => {
                let mut patch = self;
                patch.fields.insert(key, value);
                patch
            }
        }
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.order.is_none() && self.status_group.is_none() && self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rank_numeric_ordering() {
        assert!(Rank::from("2") < Rank::from("10"));
        assert!(Rank::from("10") < Rank::from("a"));
        assert!(Rank::from("a") < Rank::from("b"));
        assert_eq!(Rank::from("7").as_int(), Some(7));
        assert_eq!(Rank::from("x7").as_int(), None);
    }

    #[test]
    fn test_rank_long_integers() {
        let long = Rank::from("99999999999999999999");
        assert!(long.is_integer());
        assert_eq!(long.as_int(), None);
        assert!(Rank::from("9") < long);
        assert!(long < Rank::from("a"));
        assert!(Rank::from("-10") < Rank::from("-9"));
        assert!(Rank::from("-1") < Rank::from("0"));
        assert!(Rank::from("007") < Rank::from("8"));
    }

    #[test]
    fn test_rank_after() {
        assert_eq!(Rank::after(None), Rank::from("1"));
        assert_eq!(Rank::after(Some(&Rank::from("4"))), Rank::from("5"));
        assert_eq!(Rank::after(Some(&Rank::from("-1"))), Rank::from("0"));
        assert_eq!(Rank::after(Some(&Rank::from("-10"))), Rank::from("-9"));
        assert_eq!(Rank::after(Some(&Rank::from("009"))), Rank::from("10"));
    }

    #[test]
    fn test_successor_sorts_after() {
        for raw in ["zz", "99999999999999999999", "9223372036854775807", "-", "", "1.5", "-0"] {
            let rank = Rank::from(raw);
            let next = rank.successor();
            assert!(next > rank, "{:?} should follow {:?}", next, rank);
        }
        assert_eq!(
            Rank::from("9223372036854775807").successor(),
            Rank::from("9223372036854775808")
        );
        assert_eq!(Rank::from("zz").successor(), Rank::from("zza"));
    }

    #[test]
    fn test_item_wire_format_flattens_payload() {
        let item = OrderedItem::new("1", "3", "todo").with_field("title", json!("Fix login"));
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({"id": "1", "order": "3", "status_group": "todo", "title": "Fix login"})
        );

        let back: OrderedItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_patch_merges_fields() {
        let item = OrderedItem::new("1", "1", "todo")
            .with_field("title", json!("a"))
            .with_field("priority", json!("low"));
        let patch = ItemPatch::new()
            .status_group("done")
            .field("priority", json!("high"));

        let patched = item.patched(&patch);
        assert_eq!(patched.status_group, "done");
        assert_eq!(patched.order, Rank::from("1"));
        assert_eq!(patched.payload["title"], "a");
        assert_eq!(patched.payload["priority"], "high");
        // Input untouched
        assert_eq!(item.status_group, "todo");
    }

    #[test]
    fn test_reserved_columns_use_typed_fields() {
        let item = OrderedItem::new("1", "1", "todo");
        let patch = ItemPatch::new()
            .field("status_group", json!("done"))
            .field("order", json!(4))
            .field("id", json!("other"));
        assert!(patch.fields.is_empty());

        let patched = item.patched(&patch);
        assert_eq!(patched.id, ItemId::from("1"));
        assert_eq!(patched.status_group, "done");
        assert_eq!(patched.order, Rank::from("4"));

        let wire = serde_json::to_string(&patched).unwrap();
        let back: OrderedItem = serde_json::from_str(&wire).unwrap();
        assert_eq!(back, patched);

        let draft = ItemDraft::new("todo")
            .with_field("status_group", json!("doing"))
            .with_field("id", json!("x"));
        assert_eq!(draft.status_group, "doing");
        assert!(draft.fields.is_empty());

        let built = OrderedItem::new("1", "1", "todo").with_field("status_group", json!("done"));
        assert_eq!(built.status_group, "done");
        assert!(built.payload.is_empty());
    }

    #[test]
    fn test_reserved_keys_in_raw_maps_are_ignored() {
        let mut patch = ItemPatch::new();
        patch.fields.insert("status_group".into(), json!("done"));
        let patched = OrderedItem::new("1", "1", "todo").patched(&patch);
        assert_eq!(patched.status_group, "todo");
        assert!(patched.payload.is_empty());

        let mut draft = ItemDraft::new("todo");
        draft.fields.insert("order".into(), json!("3"));
        let item = draft.into_item(ItemId::from("1"), Rank::from("1"));
        assert!(item.payload.is_empty());
    }

    #[test]
    fn test_temporary_id() {
        assert!(ItemId::from("temp-123").is_temporary("temp-"));
        assert!(!ItemId::from("srv-9").is_temporary("temp-"));
    }
}
