//! Errors returned by the engine's outer surfaces.
//!
//! Tick code never returns these: devices and connectivity degrade to no-ops.
//! Only prototype loading, spawning, entity edits and snapshot encoding fail.

/// Errors that can occur outside the tick loop
#[derive(Debug)]
pub enum AtmosError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Bincode(Box<bincode::ErrorKind>),
    /// A prototype id that is not in the set.
    UnknownPrototype(String),
    /// The entity was despawned or never had the required components.
    NoSuchEntity,
    /// The entity has no pipe node with this name.
    NoSuchNode(String),
    VersionMismatch { expected: u32, found: u32 },
    InvalidPrototype { id: String, reason: String },
    InvalidConfig(String),
}

impl From<std::io::Error> for AtmosError {
    fn from(e: std::io::Error) -> Self {
        AtmosError::Io(e)
    }
}

impl From<serde_json::Error> for AtmosError {
    fn from(e: serde_json::Error) -> Self {
        AtmosError::Json(e)
    }
}

impl From<Box<bincode::ErrorKind>> for AtmosError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        AtmosError::Bincode(e)
    }
}

impl From<hecs::NoSuchEntity> for AtmosError {
    fn from(_: hecs::NoSuchEntity) -> Self {
        AtmosError::NoSuchEntity
    }
}

impl From<hecs::ComponentError> for AtmosError {
    fn from(_: hecs::ComponentError) -> Self {
        AtmosError::NoSuchEntity
    }
}

impl std::fmt::Display for AtmosError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtmosError::Io(e) => write!(f, "IO error: {}", e),
            AtmosError::Json(e) => write!(f, "JSON error: {}", e),
            AtmosError::Bincode(e) => write!(f, "Serialization error: {}", e),
            AtmosError::UnknownPrototype(id) => write!(f, "Unknown prototype '{}'", id),
            AtmosError::NoSuchEntity => write!(f, "No such entity"),
            AtmosError::NoSuchNode(name) => write!(f, "No pipe node named '{}'", name),
            AtmosError::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Snapshot version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            AtmosError::InvalidPrototype { id, reason } => {
                write!(f, "Invalid prototype '{}': {}", id, reason)
            }
            AtmosError::InvalidConfig(reason) => write!(f, "Invalid config: {}", reason),
        }
    }
}

impl std::error::Error for AtmosError {}
