//! Session Snapshot
//!
//! The identity provider owns sign-in; the core only reads the bearer
//! credential, the user role and whether the platform permission was granted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{CoreError, Credential};

/// OAuth scope needed to edit video localizations and upload captions
pub const YOUTUBE_UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.force-ssl";

/// User role assigned by the identity provider
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Viewer,
    Translator,
    Admin,
}

impl Role {
    /// Translators and admins may act on tracks that are mid-translation
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::Translator | Self::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Translator => "translator",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "translator" => Ok(Self::Translator),
            "admin" => Ok(Self::Admin),
            other => Err(CoreError::ValidationError(format!("Unknown role: {}", other))),
        }
    }
}

/// Whether a session can go straight to an apply
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Uploadability {
    Ready,
    /// The user must first grant the platform upload permission
    NeedsPermission,
}

/// Snapshot of the signed-in user
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default, skip_serializing)]
    credential: Option<Credential>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub permission_granted: bool,
}

impl Session {
    /// Anonymous viewer without a credential
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Signed-in session; an empty credential counts as absent
    pub fn signed_in(credential: impl Into<Credential>, role: Role) -> Self {
        let credential = credential.into();
        Self {
            credential: (!credential.trim().is_empty()).then_some(credential),
            role,
            permission_granted: true,
        }
    }

    pub fn with_permission_granted(mut self, granted: bool) -> Self {
        self.permission_granted = granted;
        self
    }

    /// Derives the upload permission from the scopes granted to the token,
    /// separated by spaces or commas.
    pub fn with_granted_scopes(self, scopes: &str) -> Self {
        let granted = scopes
            .split([' ', ','])
            .any(|scope| scope.trim() == YOUTUBE_UPLOAD_SCOPE);
        self.with_permission_granted(granted)
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    pub fn uploadability(&self) -> Uploadability {
        if self.is_authenticated() && self.permission_granted {
            Uploadability::Ready
        } else {
            Uploadability::NeedsPermission
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("role", &self.role)
            .field("permission_granted", &self.permission_granted)
            .finish()
    }
}
