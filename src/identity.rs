//! Identity session.
//!
//! Holds the optional signed-in principal. Created once at app start, shared
//! with the reconciliation layer, and cleared on logout. Credentials never
//! pass through here; only the principal's textual form is kept.

use std::sync::RwLock;

use log::info;

/// A signed-in principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    principal: String,
}

impl Identity {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
        }
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Abbreviated principal used as a default display name.
    pub fn short_name(&self) -> String {
        let prefix: String = self.principal.chars().take(12).collect();
        format!("{}...", prefix)
    }
}

/// Session context carrying the optional identity.
#[derive(Debug, Default)]
pub struct IdentitySession {
    current: RwLock<Option<Identity>>,
}

impl IdentitySession {
    /// Session with nobody signed in.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(identity: Identity) -> Self {
        Self {
            current: RwLock::new(Some(identity)),
        }
    }

    pub fn sign_in(&self, identity: Identity) {
        info!("[Identity] Signed in as {}", identity.short_name());
        if let Ok(mut guard) = self.current.write() {
            *guard = Some(identity);
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut guard) = self.current.write() {
            if guard.take().is_some() {
                info!("[Identity] Signed out");
            }
        }
    }

    pub fn current(&self) -> Option<Identity> {
        self.current.read().ok().and_then(|guard| guard.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}
