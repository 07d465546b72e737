//! # policy-store
//!
//! Per-device network access policy. Devices are identified by hardware
//! address and collected into groups; each group is bound to at most one rule
//! deciding whether the devices' traffic is accepted or dropped, with
//! exception apps describing traffic the packet inspector may still let
//! through.
//!
//! The [`PolicyStore`] keeps rules and groups behind one reader-writer lock.
//! Administrative edits are rare and take it exclusively; resolution runs on
//! every packet and only ever shares it.
//!
//! ## Quick start
//!
//! ```rust
//! use policy_store::{Action, MacAddr, PolicyStore};
//!
//! let store = PolicyStore::new();
//! store.add_rule("bedtime", Action::Drop, &[], &["tcp:443:school.example.org"]).unwrap();
//!
//! let tablet: MacAddr = "aa:bb:cc:dd:ee:01".parse().unwrap();
//! store.add_group("kids", &[tablet], Some("bedtime")).unwrap();
//!
//! assert_eq!(store.action_for_address(&tablet), Action::Drop);
//! ```

mod catalog;
mod error;
mod except_app;
mod feature;
pub mod limits;
pub mod loader;
mod mac;
mod model;
pub mod report;
mod resolve;
mod schema;
mod snapshot;
mod store;

// Re-export primary public API at crate root.
pub use catalog::{AppCatalog, StaticCatalog};
pub use error::{EntityKind, Outcome, PolicyError};
pub use except_app::{
    protocol_name, ByteSignature, ExceptApp, PortRange, PortSet, IPPROTO_ICMP, IPPROTO_TCP,
    IPPROTO_UDP,
};
pub use feature::{ExceptAppBuilder, FeatureStringBuilder};
pub use mac::{MacAddr, MacParseError};
pub use model::{Action, Group, Rule, UnknownAction};
pub use report::ReportView;
pub use schema::{AppEntry, GroupSpec, PolicyFile, RuleSpec};
pub use snapshot::RuleSnapshot;
pub use store::PolicyStore;
