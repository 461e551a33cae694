//! Process-scoped table of registered class/type labels.

use crate::CLASS_LABEL_PREFIX;
use crate::error::EndpointError;
use crate::identity::ServerIdentity;

use common::ErrorLocation;

use std::collections::HashMap;
use std::panic::Location;
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

/// Generate a label no other registration in this process can share.
pub fn fresh_class_label() -> String {
    format!("{CLASS_LABEL_PREFIX}{}", Uuid::new_v4().simple())
}

/// Labels currently registered, with the identity each one belongs to.
#[derive(Debug, Default)]
pub struct ClassTable {
    labels: Mutex<HashMap<String, ServerIdentity>>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh label for `identity` and return it.
    #[track_caller]
    pub fn register(&self, identity: &ServerIdentity) -> Result<String, EndpointError> {
        let label = fresh_class_label();
        let mut labels = self.lock();

        if labels.contains_key(&label) {
            return Err(EndpointError::Create {
                message: format!("Class label {label} is already registered"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        labels.insert(label.clone(), identity.clone());
        Ok(label)
    }

    #[track_caller]
    pub fn unregister(&self, label: &str) -> Result<(), EndpointError> {
        match self.lock().remove(label) {
            Some(_) => Ok(()),
            None => Err(EndpointError::Unregister {
                message: format!("Class label {label} is not registered"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.lock().contains_key(label)
    }

    /// Labels registered for `identity`.
    pub fn labels_for(&self, identity: &ServerIdentity) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(_, owner)| *owner == identity)
            .map(|(label, _)| label.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ServerIdentity>> {
        self.labels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
