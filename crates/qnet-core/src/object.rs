//! Objects: typed tokens that move through object places

use crate::{Error, IdGenerator, ItemCounter, ObjectId, ObjectType, Result, Value, ValueMap};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Lifecycle status of an object
///
/// Only `Active` objects are eligible for binding enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObjectStatus {
    #[default]
    Created,
    Active,
    Inactive,
    Terminated,
}

/// Declarative description of an object type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectTypeDescriptor {
    pub name: ObjectType,
    /// Attributes every new object starts with
    #[serde(default)]
    pub default_attributes: ValueMap,
    /// Whether objects of this type appear in the event log
    #[serde(default = "default_loggable")]
    pub loggable: bool,
}

fn default_loggable() -> bool {
    true
}

impl ObjectTypeDescriptor {
    pub fn new(name: impl Into<ObjectType>) -> Self {
        Self {
            name: name.into(),
            default_attributes: ValueMap::new(),
            loggable: true,
        }
    }

    /// Add a default attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.default_attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_loggable(mut self, loggable: bool) -> Self {
        self.loggable = loggable;
        self
    }
}

/// Registry of object type descriptors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectTypeRegistry {
    types: IndexMap<ObjectType, ObjectTypeDescriptor>,
}

impl ObjectTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, replacing an earlier one with the same name
    pub fn register(&mut self, descriptor: ObjectTypeDescriptor) {
        self.types.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &ObjectType) -> Option<&ObjectTypeDescriptor> {
        self.types.get(name)
    }

    /// Get a descriptor, registering a plain one for unknown names
    pub fn get_or_register(&mut self, name: &ObjectType) -> &ObjectTypeDescriptor {
        self.types
            .entry(name.clone())
            .or_insert_with(|| ObjectTypeDescriptor::new(name.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectTypeDescriptor> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// A concrete object instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub id: ObjectId,
    pub object_type: ObjectType,
    pub status: ObjectStatus,
    pub attributes: ValueMap,
    /// Item quantities the object carries (e.g. ordered items)
    pub quantities: ItemCounter,
    /// Object-to-object relations with a qualifier
    pub o2o: IndexMap<ObjectId, String>,
    pub created_at: NaiveDateTime,
    pub last_change: NaiveDateTime,
}

impl Object {
    pub fn is_active(&self) -> bool {
        self.status == ObjectStatus::Active
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }

    /// Change existing attributes
    ///
    /// Keys the object does not declare are ignored; the names of the
    /// attributes that actually changed are returned.
    pub fn change_attributes(&mut self, values: &ValueMap, time: NaiveDateTime) -> Vec<String> {
        let mut changed = Vec::new();
        for (key, value) in values {
            if let Some(slot) = self.attributes.get_mut(key) {
                if slot != value {
                    *slot = value.clone();
                    changed.push(key.clone());
                }
            }
        }
        if !changed.is_empty() {
            self.last_change = time;
        }
        changed
    }

    /// Merge a signed delta into the carried quantities
    pub fn change_quantities(&mut self, delta: &ItemCounter, time: NaiveDateTime) {
        self.quantities.update(delta);
        self.last_change = time;
    }

    pub fn add_relation(&mut self, other: ObjectId, qualifier: impl Into<String>) {
        self.o2o.insert(other, qualifier.into());
    }
}

/// Storage for all objects of one simulation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectStore {
    objects: IndexMap<ObjectId, Object>,
    ids: IdGenerator,
    by_type: IndexMap<ObjectType, Vec<ObjectId>>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object from a type descriptor
    pub fn create(&mut self, descriptor: &ObjectTypeDescriptor, time: NaiveDateTime) -> &mut Object {
        let id = ObjectId::new(self.ids.next_raw());
        self.by_type.entry(descriptor.name.clone()).or_default().push(id);
        let object = Object {
            id,
            object_type: descriptor.name.clone(),
            status: ObjectStatus::Created,
            attributes: descriptor.default_attributes.clone(),
            quantities: ItemCounter::new(),
            o2o: IndexMap::new(),
            created_at: time,
            last_change: time,
        };
        self.objects.entry(id).or_insert(object)
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(&id)
    }

    /// Get an object or fail
    pub fn require(&self, id: ObjectId) -> Result<&Object> {
        self.objects.get(&id).ok_or(Error::ObjectNotFound(id))
    }

    pub fn require_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        self.objects.get_mut(&id).ok_or(Error::ObjectNotFound(id))
    }

    /// Status of an object, `None` for unknown ids
    pub fn status(&self, id: ObjectId) -> Option<ObjectStatus> {
        self.objects.get(&id).map(|o| o.status)
    }

    pub fn set_status(&mut self, id: ObjectId, status: ObjectStatus) -> Result<()> {
        self.require_mut(id)?.status = status;
        Ok(())
    }

    /// All objects of a given type, in creation order
    pub fn by_type(&self, object_type: &ObjectType) -> impl Iterator<Item = &Object> {
        self.by_type
            .get(object_type)
            .into_iter()
            .flat_map(|ids| ids.iter().filter_map(|id| self.objects.get(id)))
    }

    /// Number of objects with the given status
    pub fn count_with_status(&self, status: ObjectStatus) -> usize {
        self.objects.values().filter(|o| o.status == status).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Marker for [`ObjectStore::rollback`]
    pub fn checkpoint(&self) -> u64 {
        self.ids.peek_raw()
    }

    /// Drop every object created since `checkpoint` and reuse their ids
    pub fn rollback(&mut self, checkpoint: u64) -> Vec<ObjectId> {
        let dropped: Vec<ObjectId> = self
            .objects
            .keys()
            .copied()
            .filter(|id| id.raw() >= checkpoint)
            .collect();
        for id in &dropped {
            self.objects.shift_remove(id);
        }
        for ids in self.by_type.values_mut() {
            ids.retain(|id| id.raw() < checkpoint);
        }
        self.ids.rewind(checkpoint);
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 10, 12)
            .and_then(|d| d.and_hms_opt(12, 21, 0))
            .unwrap()
    }

    #[test]
    fn test_create_applies_defaults() {
        let order = ObjectTypeDescriptor::new("order").with_attribute("priority", 1);
        let mut store = ObjectStore::new();
        let id = store.create(&order, t0()).id;
        let second = store.create(&order, t0()).id;

        assert_ne!(id, second);
        let object = store.get(id).unwrap();
        assert_eq!(object.status, ObjectStatus::Created);
        assert_eq!(object.get("priority"), Some(&Value::Int(1)));
        assert_eq!(store.by_type(&"order".into()).count(), 2);
    }

    #[test]
    fn test_change_attributes_only_existing() {
        let order = ObjectTypeDescriptor::new("order").with_attribute("priority", 1);
        let mut store = ObjectStore::new();
        let object = store.create(&order, t0());

        let mut values = ValueMap::new();
        values.insert("priority".into(), Value::Int(3));
        values.insert("unknown".into(), Value::Bool(true));
        let changed = object.change_attributes(&values, t0());

        assert_eq!(changed, vec!["priority".to_string()]);
        assert_eq!(object.get("priority"), Some(&Value::Int(3)));
        assert!(object.get("unknown").is_none());
    }

    #[test]
    fn test_change_quantities_merges() {
        let mut store = ObjectStore::new();
        let object = store.create(&ObjectTypeDescriptor::new("order"), t0());
        object.change_quantities(&ItemCounter::from([("A", 2)]), t0());
        object.change_quantities(&ItemCounter::from([("A", -1), ("B", 4)]), t0());
        assert_eq!(object.quantities, ItemCounter::from([("A", 1), ("B", 4)]));
    }

    #[test]
    fn test_status_lookup() {
        let mut store = ObjectStore::new();
        let id = store.create(&ObjectTypeDescriptor::new("order"), t0()).id;
        store.set_status(id, ObjectStatus::Active).unwrap();
        assert_eq!(store.status(id), Some(ObjectStatus::Active));
        assert_eq!(store.count_with_status(ObjectStatus::Active), 1);
        assert!(store.set_status(ObjectId::new(99), ObjectStatus::Active).is_err());
    }

    #[test]
    fn test_rollback_drops_objects_since_checkpoint() {
        let order = ObjectTypeDescriptor::new("order");
        let mut store = ObjectStore::new();
        let kept = store.create(&order, t0()).id;
        let checkpoint = store.checkpoint();
        let dropped = store.create(&order, t0()).id;

        assert_eq!(store.rollback(checkpoint), vec![dropped]);
        assert_eq!(store.len(), 1);
        assert!(store.get(kept).is_some());
        assert_eq!(store.by_type(&"order".into()).count(), 1);
        // ids are handed out again
        assert_eq!(store.create(&order, t0()).id, dropped);
    }

    #[test]
    fn test_registry_get_or_register() {
        let mut registry = ObjectTypeRegistry::new();
        registry.register(ObjectTypeDescriptor::new("order").with_loggable(false));
        assert!(!registry.get_or_register(&"order".into()).loggable);
        assert!(registry.get_or_register(&"product".into()).loggable);
        assert_eq!(registry.len(), 2);
    }
}
