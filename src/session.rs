//! Device sessions and the by-name session pool.
//!
//! A [`Session`] owns the connection handle to one physical crate with RAII
//! semantics: dropping an unclosed session deinitialises it with a warning.
//! No channel operation is possible without a live session, and a failed
//! init never leaks a usable handle.

use std::collections::HashMap;
use std::net::ToSocketAddrs;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{DeviceSettings, Settings};
use crate::error::{HvpsError, Result};
use crate::vendor::{HvHandle, LinkType, SystemType, VendorTable};

/// A live connection to one HVPS crate.
pub struct Session {
    api: Arc<dyn VendorTable>,
    handle: HvHandle,
    name: String,
    hostname: String,
    system: SystemType,
    link: LinkType,
    closed: bool,
}

impl Session {
    /// Connect to the crate described by `device`.
    ///
    /// The hostname is resolved to an IP once, here. Resolution failure is
    /// logged but not fatal: the raw hostname is handed to the vendor library
    /// instead, since non-network link types ignore the address anyway.
    pub fn open(api: Arc<dyn VendorTable>, name: &str, device: &DeviceSettings) -> Result<Self> {
        let address = match resolve(&device.hostname) {
            Some(ip) => ip,
            None => {
                warn!(
                    device = %name,
                    host = %device.hostname,
                    networked = device.link_type.is_networked(),
                    "could not resolve hostname, passing it to the vendor library as-is"
                );
                device.hostname.clone()
            }
        };

        let handle = api
            .init_system(
                device.system_type,
                device.link_type,
                &address,
                &device.username,
                &device.password,
            )
            .map_err(|e| HvpsError::Connection {
                device: name.to_string(),
                reason: e.to_string(),
            })?;

        info!(device = %name, host = %device.hostname, address = %address, "connected to HVPS");
        Ok(Self {
            api,
            handle,
            name: name.to_string(),
            hostname: device.hostname.clone(),
            system: device.system_type,
            link: device.link_type,
            closed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn system(&self) -> SystemType {
        self.system
    }

    pub fn link(&self) -> LinkType {
        self.link
    }

    pub(crate) fn api(&self) -> &dyn VendorTable {
        self.api.as_ref()
    }

    pub(crate) fn handle(&self) -> HvHandle {
        self.handle
    }

    /// Disconnect. A deinit failure is reported to the caller but is not a
    /// reason to abort the process; leaked handles are a vendor-library
    /// concern.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        let result = self.api.deinit_system(self.handle);
        match &result {
            Ok(()) => info!(device = %self.name, "disconnected"),
            Err(e) => warn!(device = %self.name, error = %e, "deinit failed, continuing"),
        }
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.api.deinit_system(self.handle) {
                warn!(device = %self.name, error = %e, "deinit failed while dropping session");
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("hostname", &self.hostname)
            .field("handle", &self.handle)
            .finish()
    }
}

fn resolve(hostname: &str) -> Option<String> {
    (hostname, 0u16)
        .to_socket_addrs()
        .ok()?
        .next()
        .map(|addr| addr.ip().to_string())
}

/// All open sessions, keyed by configured device name.
#[derive(Default)]
pub struct SessionPool {
    sessions: HashMap<String, Session>,
}

impl SessionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for every configured device.
    pub fn open_all(api: Arc<dyn VendorTable>, settings: &Settings) -> Result<Self> {
        let mut pool = Self::new();
        for (name, device) in &settings.devices {
            let session = Session::open(api.clone(), name, device)?;
            pool.insert(session);
        }
        Ok(pool)
    }

    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.name().to_string(), session);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Resolve a session by name.
    ///
    /// Lookup rule: an explicit name selects that device or fails with
    /// `UnknownDevice`; no name selects the sole open session, or fails with
    /// `AmbiguousDevice` when several are open.
    pub fn select(&self, name: Option<&str>) -> Result<&Session> {
        match name {
            Some(name) => self
                .sessions
                .get(name)
                .ok_or_else(|| HvpsError::UnknownDevice(name.to_string())),
            None if self.sessions.len() == 1 => {
                Ok(self.sessions.values().next().expect("len checked above"))
            }
            None if self.sessions.is_empty() => {
                Err(HvpsError::UnknownDevice("<none configured>".to_string()))
            }
            None => Err(HvpsError::AmbiguousDevice),
        }
    }

    /// Close every session, logging failures and continuing.
    pub fn close_all(self) {
        for (_, session) in self.sessions {
            let _ = session.close();
        }
    }
}
