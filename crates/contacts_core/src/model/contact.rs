//! Contact domain model.
//!
//! # Responsibility
//! - Define the stored contact record and its insert payload.
//! - Keep the JSON field order stable (`id`, `email`, `name`).
//!
//! # Invariants
//! - `id` is assigned by storage and is never reused.
//! - Contacts are created once; updates and deletes are not modelled.

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage-assigned contact identifier.
pub type ContactId = i64;

/// A contact as persisted in the `contacts` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub email: String,
    pub name: String,
}

/// Insert payload for a new contact.
///
/// Decoding is lenient: keys match case-insensitively, the last duplicate
/// wins, unknown keys are skipped, and missing or `null` fields stay empty.
/// A top-level `null` decodes as an empty payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewContact {
    pub email: String,
    pub name: String,
}

impl NewContact {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
        }
    }

    /// Attaches the id storage assigned on insert.
    pub fn into_contact(self, id: ContactId) -> Contact {
        Contact {
            id,
            email: self.email,
            name: self.name,
        }
    }
}

impl<'de> Deserialize<'de> for NewContact {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NewContactVisitor)
    }
}

struct NewContactVisitor;

impl<'de> Visitor<'de> for NewContactVisitor {
    type Value = NewContact;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a contact object")
    }

    fn visit_unit<E: de::Error>(self) -> Result<NewContact, E> {
        Ok(NewContact::default())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<NewContact, A::Error> {
        let mut contact = NewContact::default();
        while let Some(key) = map.next_key::<String>()? {
            let field = if key.eq_ignore_ascii_case("email") {
                &mut contact.email
            } else if key.eq_ignore_ascii_case("name") {
                &mut contact.name
            } else {
                map.next_value::<IgnoredAny>()?;
                continue;
            };
            if let Some(value) = map.next_value::<Option<String>>()? {
                *field = value;
            }
        }
        Ok(contact)
    }
}
