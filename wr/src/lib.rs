//! Writer - brokerless coordination for an editor and its writing panels
//!
//! An editing process and several read-only panels (outline, suggestions, review) share a
//! mutating document without a central server. Two mechanisms carry the traffic:
//!
//! - **Push channels**: named pipes carrying newline-delimited JSON messages. Fire-and-forget,
//!   readers survive writers coming and going.
//! - **Shared-file mailbox**: context snapshot, marker files and result files under one state
//!   directory, for request/response work that must not depend on the peer being up.
//!
//! # Modules
//!
//! - [`channel`] - Named-pipe endpoints and the subscription loop
//! - [`protocol`] - Message envelope encoding and lenient decoding
//! - [`mailbox`] - Marker files, context snapshot and result files
//! - [`preview`] - Which generated candidate is being previewed
//! - [`panel`] - Panel control loop and the three panels
//! - [`generator`] - Opaque text generation collaborator
//! - [`outline`] - Opaque outline extraction collaborator
//! - [`editor`] - Editor-side API
//! - [`layout`] - State directory paths
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod channel;
pub mod cli;
pub mod config;
pub mod editor;
pub mod generator;
pub mod layout;
pub mod mailbox;
pub mod outline;
pub mod panel;
pub mod preview;
pub mod protocol;

// Re-export commonly used types
pub use channel::{Channel, ChannelReader, ChannelWriter, Subscription, SubscriptionConfig, ensure_channels};
pub use config::Config;
pub use editor::EditorLink;
pub use generator::{CommandGenerator, GenerateError, Generator, MockGenerator, WritingContext, create_generator};
pub use layout::StateDir;
pub use mailbox::{ContextSnapshot, Mailbox, RequestKind};
pub use outline::{LatexOutline, MarkdownOutline, OutlineParser, parser_for_path};
pub use panel::{ControlLoop, OutlinePanel, Panel, ReviewPanel, SuggestionsPanel};
pub use preview::{PreviewMachine, PreviewMode, PreviewSnapshot, PreviewState};
pub use protocol::{Message, MessageKind, decode, encode};
