//! Domain features built on `core`: the history ledger, operator settings,
//! the playbook catalog and the host status sampler.

pub mod history;
pub mod playbooks;
pub mod settings;
pub mod system;
