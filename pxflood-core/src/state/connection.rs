//! Lifecycle of a single drawing connection.
//!
//! Transitions are validated and return `Result` instead of panicking.

use std::time::Instant;

use crate::error::FloodError;

// ── ConnectionPhase ──────────────────────────────────────────────

/// The current phase of a connection to the canvas server.
///
/// ```text
///  Disconnected ──► Connected ──► Handshaken ──► Drawing ──► Terminated
///                       │                           ▲
///                       └───────────────────────────┘
/// ```
///
/// Only the connection that queries `SIZE` passes through `Handshaken`.
/// There is no way back from `Terminated`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// No socket yet.
    #[default]
    Disconnected,

    /// TCP link is up.
    Connected,

    /// The canvas size has been read from this connection.
    Handshaken,

    /// Consuming tiles from the work queue.
    Drawing {
        /// When drawing started.
        since: Instant,
    },

    /// Stopped, either cleanly or after an error.
    Terminated,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
            Self::Handshaken => write!(f, "Handshaken"),
            Self::Drawing { .. } => write!(f, "Drawing"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

impl ConnectionPhase {
    pub fn is_drawing(&self) -> bool {
        matches!(self, Self::Drawing { .. })
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// How long the connection has been drawing.
    ///
    /// Returns `None` for any other phase.
    pub fn drawing_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Drawing { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connected`.
    ///
    /// Valid from: `Disconnected`.
    pub fn connected(&mut self) -> Result<(), FloodError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connected;
                Ok(())
            }
            _ => Err(FloodError::InvalidTransition(
                "cannot connect: not in Disconnected state",
            )),
        }
    }

    /// Transition to `Handshaken`.
    ///
    /// Valid from: `Connected`.
    pub fn handshaken(&mut self) -> Result<(), FloodError> {
        match self {
            Self::Connected => {
                *self = Self::Handshaken;
                Ok(())
            }
            _ => Err(FloodError::InvalidTransition(
                "cannot handshake: not in Connected state",
            )),
        }
    }

    /// Transition to `Drawing`.
    ///
    /// Valid from: `Connected`, `Handshaken`.
    pub fn start_drawing(&mut self) -> Result<(), FloodError> {
        match self {
            Self::Connected | Self::Handshaken => {
                *self = Self::Drawing {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(FloodError::InvalidTransition(
                "cannot draw: not in Connected or Handshaken state",
            )),
        }
    }

    /// Move to `Terminated` from any phase.
    pub fn terminate(&mut self) {
        *self = Self::Terminated;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshaking_lifecycle() {
        let mut phase = ConnectionPhase::default();
        assert_eq!(phase, ConnectionPhase::Disconnected);

        phase.connected().unwrap();
        assert_eq!(phase, ConnectionPhase::Connected);

        phase.handshaken().unwrap();
        assert_eq!(phase, ConnectionPhase::Handshaken);

        phase.start_drawing().unwrap();
        assert!(phase.is_drawing());
        assert!(phase.drawing_duration().is_some());

        phase.terminate();
        assert!(phase.is_terminated());
    }

    #[test]
    fn secondary_connection_skips_handshake() {
        let mut phase = ConnectionPhase::Disconnected;
        phase.connected().unwrap();
        phase.start_drawing().unwrap();
        assert!(phase.is_drawing());
    }

    #[test]
    fn invalid_transitions() {
        let mut phase = ConnectionPhase::Disconnected;
        assert!(phase.handshaken().is_err());
        assert!(phase.start_drawing().is_err());

        phase.connected().unwrap();
        assert!(phase.connected().is_err());

        phase.start_drawing().unwrap();
        assert!(phase.handshaken().is_err());
    }

    #[test]
    fn no_way_back_from_terminated() {
        let mut phase = ConnectionPhase::Handshaken;
        phase.terminate();
        assert!(phase.connected().is_err());
        assert!(phase.start_drawing().is_err());
        assert_eq!(phase.drawing_duration(), None);
    }

    #[test]
    fn display_format() {
        assert_eq!(ConnectionPhase::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionPhase::Connected.to_string(), "Connected");
        assert_eq!(ConnectionPhase::Handshaken.to_string(), "Handshaken");
        assert_eq!(
            ConnectionPhase::Drawing {
                since: Instant::now()
            }
            .to_string(),
            "Drawing"
        );
        assert_eq!(ConnectionPhase::Terminated.to_string(), "Terminated");
    }
}
