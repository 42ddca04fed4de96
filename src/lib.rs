//! Small concurrency and language-semantics playgrounds.
//!
//! - [`race`]: two threads appending into one shared sequence, with and
//!   without synchronization, plus a message-passing variant.
//! - [`value_semantics`]: copying a value vs. aliasing a reference.
//! - [`client`]: a toy form-encoded login client.
//! - [`highlight`]: code snippet to dark HTML preview page.

pub mod client;
pub mod config;
pub mod error;
pub mod highlight;
pub mod logging;
pub mod race;
pub mod sequence;
pub mod value_semantics;

pub use error::{PlaygroundError, Result};
