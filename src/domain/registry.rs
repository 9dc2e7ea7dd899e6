use std::collections::HashMap;

use super::{Identity, LedgerError, Person};

/// Identity -> profile mapping, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    people: Vec<Person>,
    index: HashMap<Identity, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `identity` may register under `display_name`.
    /// Returns the trimmed name to store.
    pub(crate) fn check_registration(
        &self,
        identity: &Identity,
        display_name: &str,
    ) -> Result<String, LedgerError> {
        if self.is_registered(identity) {
            return Err(LedgerError::AlreadyRegistered(identity.clone()));
        }
        let name = display_name.trim();
        if name.is_empty() {
            return Err(LedgerError::EmptyName);
        }
        Ok(name.to_string())
    }

    /// Store a person whose registration was already checked.
    pub(crate) fn insert(&mut self, person: Person) {
        self.index.insert(person.identity.clone(), self.people.len());
        self.people.push(person);
    }

    pub fn get_person(&self, identity: &Identity) -> Result<&Person, LedgerError> {
        self.index
            .get(identity)
            .and_then(|&i| self.people.get(i))
            .ok_or_else(|| LedgerError::PersonNotFound(identity.clone()))
    }

    pub fn is_registered(&self, identity: &Identity) -> bool {
        self.index.contains_key(identity)
    }

    /// All people in registration order.
    pub fn list_registered(&self) -> impl Iterator<Item = &Person> + '_ {
        self.people.iter()
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }
}
