//! # CLI Module
//!
//! This module provides the command-line interface layer for tagsync. It
//! validates the merged flag/environment configuration, assembles the
//! provider set and the store backend, and hands both to the sync driver.
//!
//! ## Command Flow
//!
//! 1. **Credential Merge**: CLI flags take precedence, environment
//!    variables (usually via the `.env` file) fill the gaps.
//! 2. **Validation**: at least one tag, at least one provider credential,
//!    and either both or neither of the spreadsheet options.
//! 3. **Assembly**: one provider instance per configured source, one store
//!    backend (local CSV by default, the remote spreadsheet when selected).
//! 4. **Sync**: record-by-record harvest with per-record progress lines
//!    and a per-provider summary table at the end.
//!
//! ## Error Handling Philosophy
//!
//! Configuration problems are reported with a descriptive message and a
//! non-zero exit before any network traffic happens. A provider or store
//! failure mid-run aborts the run the same way; rows committed before the
//! failure stay committed.

mod harvest;

pub use harvest::HarvestOptions;
pub use harvest::harvest;
