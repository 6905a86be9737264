//! Menu document: display name -> schema path fragment, in authoring order.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Maps a menu fragment to the schema document path it names.
#[must_use]
pub fn schema_path(fragment: &str) -> String {
    format!("schemas/{fragment}.json")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    /// Text shown in the menu.
    pub name: String,
    /// Schema path fragment, e.g. `customer`.
    pub fragment: String,
}

impl MenuEntry {
    #[must_use]
    pub fn schema_path(&self) -> String {
        schema_path(&self.fragment)
    }
}

/// Ordered menu entries.
///
/// Serialized as a JSON object; entry order follows the document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Menu {
    entries: Vec<MenuEntry>,
}

impl Menu {
    #[must_use]
    pub fn new(entries: Vec<MenuEntry>) -> Self {
        Self { entries }
    }

    /// Parses a menu document.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the document is not an object of strings.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    /// Finds an entry by display name, falling back to fragment.
    #[must_use]
    pub fn find(&self, key: &str) -> Option<&MenuEntry> {
        self.entries
            .iter()
            .find(|e| e.name == key)
            .or_else(|| self.entries.iter().find(|e| e.fragment == key))
    }

    /// Whether `entry` is the one whose schema is currently shown.
    #[must_use]
    pub fn is_active(entry: &MenuEntry, active_schema_path: Option<&str>) -> bool {
        active_schema_path.is_some_and(|path| path == entry.schema_path())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Menu {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.name, &entry.fragment)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Menu {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MenuVisitor;

        impl<'de> Visitor<'de> for MenuVisitor {
            type Value = Menu;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping menu names to schema fragments")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Menu, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, fragment)) = access.next_entry::<String, String>()? {
                    entries.push(MenuEntry { name, fragment });
                }
                Ok(Menu { entries })
            }
        }

        deserializer.deserialize_map(MenuVisitor)
    }
}
