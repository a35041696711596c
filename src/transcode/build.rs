//! The builder: reconstructing a tree-form message from flat paths.
//!
//! Each flat key is decoded into a sequence of path segments and folded
//! into the growing tree. An id-marker or key-field segment means the
//! value under the previous field is really an array; the slot holding it
//! is promoted from object to array in place, and the segment then
//! selects (or creates) the element to descend into. Key-field segments
//! that cannot select an element yet accumulate in a pending set which
//! the next literal segment resolves.
//!
//! Building is order-independent over the key set: promotion wraps an
//! already-populated object as the first array element instead of
//! discarding it, and elements created for an id segment are stamped with
//! that id so later keys find them no matter which key came first.

use crate::config::TicConfig;
use crate::error::TicError;
use crate::node;
use crate::result::MESSAGES_PROPERTY;
use crate::transcode::flatten::FlatMessage;
use serde_json::{Map, Value};
use tracing::warn;

/// Result of rebuilding one flat message. `skipped` lists the flat keys
/// that could not be folded into the tree; an empty list means full
/// reconstruction.
#[derive(Debug)]
pub struct BuildReport {
    pub message: Value,
    pub skipped: Vec<String>,
}

/// One decoded path segment.
#[derive(Debug)]
enum Segment {
    /// Array element selector, optionally carrying the element id.
    Id(Option<String>),
    /// A field/value pair encoded into the path: a marker-wrapped open
    /// key field, a bare close key-field value, or a unit/reference
    /// classification.
    KeyField { field: String, value: String },
    /// A plain field name.
    Literal(String),
}

/// Rebuilds tree-form messages from flat path/value pairs.
pub struct Builder<'a> {
    config: &'a TicConfig,
}

impl<'a> Builder<'a> {
    pub fn new(config: &'a TicConfig) -> Self {
        Builder { config }
    }

    /// Rebuild one message. Malformed keys are skipped and reported, the
    /// rest of the message is still built.
    pub fn build(&self, flat: &FlatMessage, id_field: Option<&str>) -> BuildReport {
        let id_field = self.config.id_field_or(id_field);
        let mut root = Value::Object(Map::new());
        let mut skipped = Vec::new();

        for (key, value) in flat {
            if let Err(e) = self.insert_key(&mut root, key, value, id_field) {
                warn!(%key, error = %e, "skipping flat key");
                skipped.push(key.clone());
            }
        }

        BuildReport {
            message: root,
            skipped,
        }
    }

    /// Rebuild every flat message found in `input`: a single flat object,
    /// an array of flat objects, or a flatten result envelope carrying a
    /// `messages` array.
    pub fn build_messages(
        &self,
        input: &Value,
        id_field: Option<&str>,
    ) -> Result<Vec<BuildReport>, TicError> {
        let mut sources: Vec<&Map<String, Value>> = Vec::new();

        match input {
            Value::Object(obj) => match obj.get(MESSAGES_PROPERTY) {
                Some(Value::Array(items)) => {
                    sources.extend(items.iter().filter_map(Value::as_object));
                }
                _ => sources.push(obj),
            },
            Value::Array(items) => {
                sources.extend(items.iter().filter_map(Value::as_object));
            }
            _ => return Err(TicError::RootNotObject),
        }

        Ok(sources
            .into_iter()
            .map(|flat| self.build(flat, id_field))
            .collect())
    }

    fn insert_key(
        &self,
        root: &mut Value,
        key: &str,
        leaf: &Value,
        id_field: &str,
    ) -> Result<(), TicError> {
        let segments = key
            .split('.')
            .map(|s| self.classify(key, s))
            .collect::<Result<Vec<_>, _>>()?;
        if segments.is_empty() {
            return Err(malformed(key, "empty path"));
        }

        let mut pending = Vec::new();
        self.apply(
            root,
            &segments,
            leaf,
            &mut pending,
            true, // the root object takes key-field stamps directly
            id_field,
            key,
        )
    }

    /// Fold `segments` into the tree at `current`. `stamp_here` is true
    /// when key-field segments apply to `current` itself (the root, or an
    /// array element just selected by an id segment) instead of opening
    /// an array level.
    fn apply(
        &self,
        current: &mut Value,
        segments: &[Segment],
        leaf: &Value,
        pending: &mut Vec<(String, String)>,
        stamp_here: bool,
        id_field: &str,
        key: &str,
    ) -> Result<(), TicError> {
        let (segment, rest) = match segments.split_first() {
            Some(split) => split,
            None => return Ok(()),
        };
        let last = rest.is_empty();

        match segment {
            Segment::Id(id) => {
                if last {
                    return Err(malformed(key, "path ends on an id marker"));
                }
                if stamp_here {
                    // Promoting here would replace the current object
                    // (possibly the root) rather than a field under it
                    return Err(malformed(key, "id marker cannot start a path"));
                }
                if !promote_to_array(current) {
                    return Err(malformed(key, "id marker over a scalar field"));
                }
                let arr = match current {
                    Value::Array(arr) => arr,
                    _ => return Err(malformed(key, "id marker needs an array")),
                };
                let pos = match find_by_id(arr, id.as_deref(), id_field) {
                    Some(pos) => pos,
                    None => {
                        let mut elem = Map::new();
                        if let Some(id) = id {
                            elem.insert(id_field.to_string(), Value::String(id.clone()));
                        }
                        arr.push(Value::Object(elem));
                        arr.len() - 1
                    }
                };
                self.apply(&mut arr[pos], rest, leaf, pending, true, id_field, key)
            }

            Segment::KeyField { field, value } => {
                if last {
                    return Err(malformed(key, "path ends on a key-field segment"));
                }
                if stamp_here {
                    // The element (or root) is already selected; the
                    // decoded pair becomes one of its plain properties
                    let obj = current
                        .as_object_mut()
                        .ok_or_else(|| malformed(key, "key field over a scalar"))?;
                    obj.insert(field.clone(), Value::String(value.clone()));
                    self.apply(current, rest, leaf, pending, true, id_field, key)
                } else {
                    if !promote_to_array(current) {
                        return Err(malformed(key, "key field over a scalar field"));
                    }
                    pending.push((field.clone(), value.clone()));
                    self.apply(current, rest, leaf, pending, false, id_field, key)
                }
            }

            Segment::Literal(name) => {
                if !pending.is_empty() {
                    let arr = match current {
                        Value::Array(arr) => arr,
                        _ => return Err(malformed(key, "pending key fields need an array")),
                    };
                    let pos = match find_by_fields(arr, pending) {
                        Some(pos) => pos,
                        None => {
                            let mut elem = Map::new();
                            for (field, value) in pending.iter() {
                                elem.insert(field.clone(), Value::String(value.clone()));
                            }
                            arr.push(Value::Object(elem));
                            arr.len() - 1
                        }
                    };
                    pending.clear();
                    let elem = arr[pos]
                        .as_object_mut()
                        .ok_or_else(|| malformed(key, "matched element is not an object"))?;
                    if last {
                        elem.insert(name.clone(), leaf.clone());
                        Ok(())
                    } else {
                        let child = elem
                            .entry(name.clone())
                            .or_insert_with(|| Value::Object(Map::new()));
                        self.apply(child, rest, leaf, pending, false, id_field, key)
                    }
                } else {
                    let obj = current
                        .as_object_mut()
                        .ok_or_else(|| malformed(key, "field set on a non-object"))?;
                    if last {
                        obj.insert(name.clone(), leaf.clone());
                        Ok(())
                    } else {
                        let child = obj
                            .entry(name.clone())
                            .or_insert_with(|| Value::Object(Map::new()));
                        self.apply(child, rest, leaf, pending, false, id_field, key)
                    }
                }
            }
        }
    }

    /// Decode one raw path token.
    fn classify(&self, key: &str, raw: &str) -> Result<Segment, TicError> {
        if raw.is_empty() {
            return Err(malformed(key, "empty path segment"));
        }
        let c = self.config;

        if let Some(rest) = raw.strip_prefix(c.marker_id.as_str()) {
            let id = if rest.is_empty() {
                None
            } else {
                Some(rest.to_string())
            };
            return Ok(Segment::Id(id));
        }
        if let Some(rest) = raw.strip_prefix(c.marker_key_field.as_str()) {
            // Wrapped open key field: <KF>field<KF>value
            let (field, value) = rest
                .split_once(c.marker_key_field.as_str())
                .ok_or_else(|| malformed(key, "unterminated key-field marker"))?;
            if field.is_empty() {
                return Err(malformed(key, "key-field marker without a field name"));
            }
            return Ok(Segment::KeyField {
                field: field.to_string(),
                value: value.to_string(),
            });
        }
        if let Some(rest) = raw.strip_prefix(c.marker_unit.as_str()) {
            return Ok(Segment::KeyField {
                field: "unit".to_string(),
                value: rest.to_string(),
            });
        }
        if let Some(rest) = raw.strip_prefix(c.marker_reference.as_str()) {
            return Ok(Segment::KeyField {
                field: "reference".to_string(),
                value: rest.to_string(),
            });
        }
        if let Some(field) = c.field_for_value(raw) {
            return Ok(Segment::KeyField {
                field: field.to_string(),
                value: raw.to_string(),
            });
        }
        Ok(Segment::Literal(raw.to_string()))
    }
}

/// Make the slot an array. A populated object becomes the first element,
/// an empty one is dropped. Scalars cannot be promoted.
fn promote_to_array(slot: &mut Value) -> bool {
    if slot.is_array() {
        return true;
    }
    if !slot.is_object() {
        return false;
    }
    let prev = std::mem::take(slot);
    let elements = match prev {
        Value::Object(obj) if obj.is_empty() => Vec::new(),
        other => vec![other],
    };
    *slot = Value::Array(elements);
    true
}

/// Element matching an id segment. With an id value, the element whose
/// id field equals it; elements without the id field are the fallback
/// only when no element carries the field at all (and always the target
/// of a bare marker). Later elements win, as in the original encoding.
fn find_by_id(arr: &[Value], id: Option<&str>, id_field: &str) -> Option<usize> {
    match id {
        Some(wanted) => {
            let mut matched = None;
            let mut any_with_id = false;
            let mut last_without = None;
            for (i, item) in arr.iter().enumerate() {
                let Some(obj) = item.as_object() else {
                    continue;
                };
                match node::get_str(obj, id_field) {
                    Some(v) => {
                        any_with_id = true;
                        if v == wanted {
                            matched = Some(i);
                        }
                    }
                    None => last_without = Some(i),
                }
            }
            matched.or(if any_with_id { None } else { last_without })
        }
        None => arr.iter().rposition(|item| {
            item.as_object()
                .map_or(false, |obj| !node::has(obj, id_field))
        }),
    }
}

/// Element whose recorded fields all equal the pending key-field values.
fn find_by_fields(arr: &[Value], pending: &[(String, String)]) -> Option<usize> {
    arr.iter().rposition(|item| {
        item.as_object().map_or(false, |obj| {
            pending
                .iter()
                .all(|(field, value)| node::get_str(obj, field).as_deref() == Some(value.as_str()))
        })
    })
}

fn malformed(key: &str, detail: &str) -> TicError {
    TicError::MalformedKey {
        key: key.to_string(),
        detail: detail.to_string(),
    }
}
