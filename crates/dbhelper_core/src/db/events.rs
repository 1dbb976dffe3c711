//! Typed observer registry for lifecycle and write events.
//!
//! # Responsibility
//! - Keep ordered observer lists per event kind.
//! - Hand out listener ids that stay unique across all kinds.
//!
//! # Invariants
//! - Observers run in registration order.
//! - Before-write dispatch stops at the first observer that cancels.

use super::diagnostics::format_query;
use super::operation::OperationType;
use super::value::Params;
use std::fmt::{Display, Formatter};

/// Handle returned when registering an observer.
pub type ListenerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Fired once, the first time the helper is initialized.
    Init,
    /// Fired before every write-classified statement.
    BeforeWriteOperation,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::BeforeWriteOperation => "BeforeWriteOperation",
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pending write operation handed to before-write observers.
#[derive(Debug)]
pub struct WriteEvent<'a> {
    operation: OperationType,
    sql: &'a str,
    variables: &'a Params,
    cancel_reason: Option<String>,
}

impl<'a> WriteEvent<'a> {
    pub(crate) fn new(operation: OperationType, sql: &'a str, variables: &'a Params) -> Self {
        Self {
            operation,
            sql,
            variables,
            cancel_reason: None,
        }
    }

    pub fn operation(&self) -> OperationType {
        self.operation
    }

    /// Statement text; with `formatted` the placeholders are replaced by
    /// their quoted values.
    pub fn statement(&self, formatted: bool) -> String {
        if formatted {
            format_query(self.sql, self.variables)
        } else {
            self.sql.to_string()
        }
    }

    pub fn variables(&self) -> &Params {
        self.variables
    }

    /// Vetoes the operation. The caller still receives a success result.
    pub fn cancel(&mut self, reason: impl Into<String>) {
        self.cancel_reason = Some(reason.into());
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_reason.is_some()
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }
}

pub trait InitObserver {
    fn on_init(&mut self);
}

impl<F: FnMut()> InitObserver for F {
    fn on_init(&mut self) {
        self()
    }
}

pub trait BeforeWriteObserver {
    fn before_write(&mut self, event: &mut WriteEvent<'_>);
}

impl<F: FnMut(&mut WriteEvent<'_>)> BeforeWriteObserver for F {
    fn before_write(&mut self, event: &mut WriteEvent<'_>) {
        self(event)
    }
}

#[derive(Default)]
pub(crate) struct EventRegistry {
    next_id: ListenerId,
    init: Vec<(ListenerId, Box<dyn InitObserver>)>,
    before_write: Vec<(ListenerId, Box<dyn BeforeWriteObserver>)>,
}

impl EventRegistry {
    fn allocate_id(&mut self) -> ListenerId {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn add_init(&mut self, observer: Box<dyn InitObserver>) -> ListenerId {
        let id = self.allocate_id();
        self.init.push((id, observer));
        id
    }

    pub(crate) fn add_before_write(&mut self, observer: Box<dyn BeforeWriteObserver>) -> ListenerId {
        let id = self.allocate_id();
        self.before_write.push((id, observer));
        id
    }

    pub(crate) fn has_listener(&self, kind: EventKind) -> bool {
        !self.listener_ids(kind).is_empty()
    }

    pub(crate) fn listener_ids(&self, kind: EventKind) -> Vec<ListenerId> {
        match kind {
            EventKind::Init => self.init.iter().map(|(id, _)| *id).collect(),
            EventKind::BeforeWriteOperation => {
                self.before_write.iter().map(|(id, _)| *id).collect()
            }
        }
    }

    /// Returns whether a listener with this id existed.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.init.len() + self.before_write.len();
        self.init.retain(|(listener, _)| *listener != id);
        self.before_write.retain(|(listener, _)| *listener != id);
        before != self.init.len() + self.before_write.len()
    }

    pub(crate) fn remove_all(&mut self, kind: EventKind) {
        match kind {
            EventKind::Init => self.init.clear(),
            EventKind::BeforeWriteOperation => self.before_write.clear(),
        }
    }

    pub(crate) fn trigger_init(&mut self) {
        for (_, observer) in &mut self.init {
            observer.on_init();
        }
    }

    pub(crate) fn trigger_before_write(&mut self, event: &mut WriteEvent<'_>) {
        for (_, observer) in &mut self.before_write {
            observer.before_write(event);
            if event.is_cancelled() {
                break;
            }
        }
    }
}
