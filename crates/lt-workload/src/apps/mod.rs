//! ---
//! lt_section: "02-workloads"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Bundled workloads running against the in-process store."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
//! Bundled workloads.

mod hello_world;
mod key_value;

pub use hello_world::{HelloWorld, HelloWorldFactory};
pub use key_value::{KeyValue, KeyValueFactory};
