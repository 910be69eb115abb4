//! Registry of the live objects behind a session.

use std::collections::BTreeMap;

use crate::driver::DriverConnection;
use crate::protocol::{Handle, CONNECTION_HANDLE};

/// State of the connection object behind handle 0.
#[derive(Debug)]
enum ConnectionSlot<C> {
    /// Handle 0 exists but `connect` has not succeeded yet.
    Pending,
    Open(C),
    /// `disconnect` has run; the session is over.
    Evicted,
}

/// Maps handles to the connection and its statements.
///
/// Handle 0 is the connection. Statement handles count up from 1 and are
/// never reused within a session, so a stale handle can always be told
/// apart from a live one. Statements are always dropped before the
/// connection they depend on.
pub struct HandleTable<C: DriverConnection> {
    connection: ConnectionSlot<C>,
    statements: BTreeMap<Handle, C::Statement>,
    next_handle: Handle,
}

impl<C: DriverConnection> Default for HandleTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: DriverConnection> HandleTable<C> {
    pub fn new() -> Self {
        Self {
            connection: ConnectionSlot::Pending,
            statements: BTreeMap::new(),
            next_handle: CONNECTION_HANDLE + 1,
        }
    }

    /// True until the connection handle has been evicted.
    pub fn is_live(&self) -> bool {
        !matches!(self.connection, ConnectionSlot::Evicted)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.connection, ConnectionSlot::Open(_))
    }

    /// Install the driver connection behind handle 0.
    ///
    /// Hands the connection back if one is already installed or the handle
    /// has been evicted.
    pub fn install(&mut self, conn: C) -> Result<(), C> {
        match self.connection {
            ConnectionSlot::Pending => {
                self.connection = ConnectionSlot::Open(conn);
                Ok(())
            }
            ConnectionSlot::Open(_) | ConnectionSlot::Evicted => Err(conn),
        }
    }

    pub fn connection_mut(&mut self) -> Option<&mut C> {
        match &mut self.connection {
            ConnectionSlot::Open(conn) => Some(conn),
            _ => None,
        }
    }

    /// Register a statement and return its new handle.
    pub fn insert(&mut self, statement: C::Statement) -> Handle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.statements.insert(handle, statement);
        handle
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.statements.contains_key(&handle)
    }

    /// Whether `handle` was handed out by this table at some point.
    pub fn was_issued(&self, handle: Handle) -> bool {
        handle != CONNECTION_HANDLE && handle < self.next_handle
    }

    /// A statement together with the connection it runs on.
    ///
    /// `None` when the statement is unknown or its connection is gone.
    pub fn statement_mut(&mut self, handle: Handle) -> Option<(&mut C, &mut C::Statement)> {
        let ConnectionSlot::Open(conn) = &mut self.connection else {
            return None;
        };
        let statement = self.statements.get_mut(&handle)?;
        Some((conn, statement))
    }

    /// Evict a statement handle.
    pub fn release(&mut self, handle: Handle) -> Option<C::Statement> {
        self.statements.remove(&handle)
    }

    /// Evict every statement, then the connection. Returns the number of
    /// statements dropped.
    pub fn evict_all(&mut self) -> usize {
        let released = self.statements.len();
        self.statements.clear();
        self.connection = ConnectionSlot::Evicted;
        released
    }

    /// Number of live statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}
