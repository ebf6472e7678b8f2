//! seance-protocol: Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert alle Ereignistypen, Enums und Strukturen
//! die zwischen Client und Relay ausgetauscht werden, sowie das
//! Legacy-Binaerformat der Capture-Stroeme.

pub mod capture;
pub mod events;
pub mod wire;

pub use events::{ClientEvent, RelayEnvelope, ServerEvent};
pub use wire::FrameCodec;
