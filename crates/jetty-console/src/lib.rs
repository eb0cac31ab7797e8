//! Interactive command console for the Jetty starter.
//!
//! Input lines are split into tokens by the [`Tokenizer`], run as a chain
//! of [`Process`]es (split at `>`, `>>` and `&`), and dispatched to
//! [`Command`]s looked up in a [`CommandRegistry`]. Which commands exist is
//! decided at startup by service manifests, see [`discovery`].

pub mod arguments;
pub mod builtin_commands;
pub mod command;
pub mod console;
pub mod discovery;
pub mod jobs;
pub mod placeholder;
pub mod process;
pub mod properties;
pub mod redirect_commands;
pub mod registry;
pub mod runtime;
pub mod scanner;
pub mod stream;
pub mod system_commands;
pub mod tokenizer;
pub mod wildcard;

pub use arguments::Arguments;
pub use builtin_commands::{Shutdown, register_builtins};
pub use command::Command;
pub use console::Console;
pub use discovery::{
    BUILTIN_MANIFEST, COMMAND_SERVICE, CommandCatalog, Dependencies, ServiceManifest, discover,
};
pub use jobs::JobTable;
pub use placeholder::{PlaceholderResolver, resolve_placeholders};
pub use process::Process;
pub use properties::{Properties, SystemResolver};
pub use registry::CommandRegistry;
pub use stream::{Input, Output, SharedBuffer, Streams};
pub use tokenizer::Tokenizer;
