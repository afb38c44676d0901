//! Container registry: the fixed fleet of monitored waste containers.
//!
//! Containers are created administratively and keep a stable numeric id for
//! their whole life. The registry also carries each container's last known
//! fill level, which is the fallback used when the reading store has nothing
//! newer to offer.

use crate::config::ContainerSeed;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Operational state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    Active,
    Inactive,
    Maintenance,
}

/// A monitored waste container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    /// Stable numeric id, unique and immutable once assigned
    pub id: u32,

    /// Display name
    pub name: String,

    /// Street address or placement note
    pub location: Option<String>,

    /// Total capacity in liters
    pub capacity_liters: f64,

    /// Operational state
    pub state: ContainerState,

    /// Last known fill percentage, updated only when a reading arrives.
    /// Serves as the fallback level when no reading can be fetched.
    pub last_known_level: f64,
}

impl Container {
    /// Build a container from a configuration seed. New containers start
    /// active with an empty fill history.
    pub fn from_seed(seed: &ContainerSeed) -> Self {
        Self {
            id: seed.id,
            name: seed.name.clone(),
            location: seed.location.clone(),
            capacity_liters: seed.capacity_liters,
            state: ContainerState::Active,
            last_known_level: 0.0,
        }
    }
}

/// Registry errors.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("container id {0} is already registered")]
    DuplicateId(u32),
}

/// In-memory registry of the container fleet, keyed by id.
#[derive(Debug, Default)]
pub struct ContainerRegistry {
    containers: RwLock<HashMap<u32, Container>>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a container. Ids are assigned once; re-registering an
    /// existing id is refused.
    pub fn insert(&self, container: Container) -> Result<(), RegistryError> {
        let mut containers = self.containers.write();
        if containers.contains_key(&container.id) {
            return Err(RegistryError::DuplicateId(container.id));
        }
        containers.insert(container.id, container);
        Ok(())
    }

    /// Remove a container from the registry, returning it if it existed.
    /// Cascading its readings and alerts is the caller's job.
    pub fn remove(&self, id: u32) -> Option<Container> {
        self.containers.write().remove(&id)
    }

    /// Look up a container by id.
    pub fn get(&self, id: u32) -> Option<Container> {
        self.containers.read().get(&id).cloned()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.containers.read().contains_key(&id)
    }

    /// Update the cached fill level for a container. Called on reading
    /// arrival only; a no-op for unknown ids.
    pub fn set_last_known_level(&self, id: u32, level_percent: f64) {
        if let Some(container) = self.containers.write().get_mut(&id) {
            container.last_known_level = level_percent;
        }
    }

    /// Change the operational state of a container.
    pub fn set_state(&self, id: u32, state: ContainerState) -> bool {
        match self.containers.write().get_mut(&id) {
            Some(container) => {
                container.state = state;
                true
            }
            None => false,
        }
    }

    /// All containers, ordered by id.
    pub fn all(&self) -> Vec<Container> {
        let mut containers: Vec<Container> = self.containers.read().values().cloned().collect();
        containers.sort_by_key(|c| c.id);
        containers
    }

    /// Containers currently in the `Active` state, ordered by id.
    pub fn active(&self) -> Vec<Container> {
        let mut containers: Vec<Container> = self
            .containers
            .read()
            .values()
            .filter(|c| c.state == ContainerState::Active)
            .cloned()
            .collect();
        containers.sort_by_key(|c| c.id);
        containers
    }

    pub fn len(&self) -> usize {
        self.containers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.read().is_empty()
    }
}
