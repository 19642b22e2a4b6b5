//! Typed selection sets announced over the event bus
//!
//! The store keeps one ordered, duplicate-free id set per selection type.
//! Every mutation is applied first and then announced with the caller's
//! `source`. The store never filters out the originator; subscribers compare
//! `event.source()` with their own id and skip their echoes.

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::events::{Event, EventBus, SelectionChanged, SelectionCleared};
use crate::ids::{SelectionId, SelectionType, SourceId};

/// What a `clear` call empties
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClearScope {
    All,
    Type(SelectionType),
}

impl ClearScope {
    pub fn covers(&self, selection_type: &SelectionType) -> bool {
        match self {
            ClearScope::All => true,
            ClearScope::Type(t) => t == selection_type,
        }
    }
}

impl From<String> for ClearScope {
    fn from(value: String) -> Self {
        if value == "all" {
            ClearScope::All
        } else {
            ClearScope::Type(SelectionType::from(value))
        }
    }
}

impl From<ClearScope> for String {
    fn from(scope: ClearScope) -> Self {
        match scope {
            ClearScope::All => "all".to_string(),
            ClearScope::Type(t) => t.as_str().to_string(),
        }
    }
}

impl From<SelectionType> for ClearScope {
    fn from(selection_type: SelectionType) -> Self {
        ClearScope::Type(selection_type)
    }
}

impl From<&str> for ClearScope {
    fn from(value: &str) -> Self {
        ClearScope::from(value.to_string())
    }
}

/// Options for [`SelectionStore::select`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOptions {
    /// Union into the current set instead of replacing it
    pub additive: bool,
    /// View that requested the mutation
    pub source: SourceId,
}

impl SelectOptions {
    pub fn replace(source: impl Into<SourceId>) -> Self {
        Self {
            additive: false,
            source: source.into(),
        }
    }

    pub fn additive(source: impl Into<SourceId>) -> Self {
        Self {
            additive: true,
            source: source.into(),
        }
    }
}

type SelectionSets = IndexMap<SelectionType, IndexSet<SelectionId>>;

/// Registry of selection sets shared by every view in a session
#[derive(Clone)]
pub struct SelectionStore {
    sets: Arc<Mutex<SelectionSets>>,
    bus: EventBus,
}

impl SelectionStore {
    pub fn new(bus: EventBus) -> Self {
        Self {
            sets: Arc::new(Mutex::new(IndexMap::new())),
            bus,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Replace (or with `additive`, extend) the set for `selection_type`.
    ///
    /// Duplicates collapse to their first occurrence. Replacing with an empty
    /// list behaves exactly like [`SelectionStore::clear`] on that type.
    /// Returns the resulting ids.
    pub fn select<I>(
        &self,
        selection_type: impl Into<SelectionType>,
        ids: I,
        options: SelectOptions,
    ) -> Vec<SelectionId>
    where
        I: IntoIterator,
        I::Item: Into<SelectionId>,
    {
        let selection_type = selection_type.into();
        let mut incoming = ids.into_iter().map(Into::<SelectionId>::into).peekable();

        if !options.additive && incoming.peek().is_none() {
            self.clear(ClearScope::Type(selection_type), options.source);
            return Vec::new();
        }

        let ids: Vec<SelectionId> = {
            let mut sets = self.sets.lock();
            let set = sets.entry(selection_type.clone()).or_default();
            if !options.additive {
                set.clear();
            }
            set.extend(incoming);
            set.iter().cloned().collect()
        };

        debug!(
            selection_type = %selection_type,
            count = ids.len(),
            additive = options.additive,
            source = %options.source,
            "select"
        );
        self.bus.emit(Event::SelectionChanged(SelectionChanged {
            selection_type,
            ids: ids.clone(),
            source: options.source,
        }));
        ids
    }

    /// Flip membership of exactly one id. Returns whether it is now selected.
    pub fn toggle(
        &self,
        selection_type: impl Into<SelectionType>,
        id: impl Into<SelectionId>,
        source: impl Into<SourceId>,
    ) -> bool {
        let selection_type = selection_type.into();
        let id = id.into();
        let source = source.into();

        let (selected, ids) = {
            let mut sets = self.sets.lock();
            let set = sets.entry(selection_type.clone()).or_default();
            // shift_remove keeps the remaining ids in insertion order
            let selected = if set.shift_remove(&id) {
                false
            } else {
                set.insert(id.clone());
                true
            };
            (selected, set.iter().cloned().collect::<Vec<_>>())
        };

        debug!(selection_type = %selection_type, %id, selected, source = %source, "toggle");
        self.bus.emit(Event::SelectionChanged(SelectionChanged {
            selection_type,
            ids,
            source,
        }));
        selected
    }

    /// Empty one selection type or all of them, announced as a single event
    pub fn clear(&self, scope: impl Into<ClearScope>, source: impl Into<SourceId>) {
        let scope = scope.into();
        let source = source.into();

        {
            let mut sets = self.sets.lock();
            for (selection_type, set) in sets.iter_mut() {
                if scope.covers(selection_type) {
                    set.clear();
                }
            }
        }

        debug!(scope = ?scope, source = %source, "clear");
        self.bus
            .emit(Event::SelectionCleared(SelectionCleared { scope, source }));
    }

    /// Selected ids of `selection_type` in insertion order; empty if never used
    pub fn get_selected(&self, selection_type: impl Into<SelectionType>) -> Vec<SelectionId> {
        self.sets
            .lock()
            .get(&selection_type.into())
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_count(&self, selection_type: impl Into<SelectionType>) -> usize {
        self.sets
            .lock()
            .get(&selection_type.into())
            .map(|set| set.len())
            .unwrap_or(0)
    }

    pub fn is_selected(&self, selection_type: impl Into<SelectionType>, id: &SelectionId) -> bool {
        self.sets
            .lock()
            .get(&selection_type.into())
            .map(|set| set.contains(id))
            .unwrap_or(false)
    }

    /// Every selection type used so far, in first-use order
    pub fn types(&self) -> Vec<SelectionType> {
        self.sets.lock().keys().cloned().collect()
    }

    /// Copy of every selection set
    pub fn snapshot(&self) -> IndexMap<SelectionType, Vec<SelectionId>> {
        self.sets
            .lock()
            .iter()
            .map(|(t, set)| (t.clone(), set.iter().cloned().collect()))
            .collect()
    }
}

impl std::fmt::Debug for SelectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionStore")
            .field("sets", &self.snapshot())
            .finish()
    }
}
