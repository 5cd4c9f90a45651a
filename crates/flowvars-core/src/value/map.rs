use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::TypedValue;

/// Mapa nombre → valor con orden de inserción estable.
///
/// Se usa para escrituras masivas y para las variables de arranque de una
/// instancia; el orden de inserción fija el orden de escritura y, por tanto,
/// el orden en que se disparan las suscripciones condicionales.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableMap {
    entries: IndexMap<String, TypedValue>,
}

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Variante encadenable de `insert`.
    pub fn put(mut self, name: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserta o reemplaza; un reemplazo conserva la posición original.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<TypedValue>) -> Option<TypedValue> {
        self.entries.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TypedValue)> {
        self.entries.iter()
    }
}

impl IntoIterator for VariableMap {
    type Item = (String, TypedValue);
    type IntoIter = indexmap::map::IntoIter<String, TypedValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<TypedValue>> FromIterator<(K, V)> for VariableMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = VariableMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
