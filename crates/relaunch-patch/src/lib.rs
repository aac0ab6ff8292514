//! Binary domain patching for the installed game client.
//!
//! Rewrites the backend domains embedded in the client executable so it talks
//! to the substitute backend, across two string encodings: the client's
//! length-prefixed string-table records and plain UTF-16LE. Patching is
//! idempotent, guarded by a verifiable flag record, and backed by a pristine
//! copy of the binary that is kept until the binary itself changes size.
//!
//! This step runs before every game launch, not only after updates, so the
//! patcher independently distinguishes "already patched for the configured
//! domain" from "binary replaced, patch again" and "domain changed, restore
//! first".

mod agent;
mod backup;
mod encoding;
mod error;
mod patcher;
mod record;
mod strategy;

pub use agent::{AGENT_FILE_NAME, AGENT_MIN_SIZE, ensure_agent};
pub use backup::{backup_path, ensure_backup, restore};
pub use encoding::{Encoder, LengthPrefixed, Utf16Le, find_occurrences};
pub use error::PatchError;
pub use patcher::{
    DomainPatcher, PatchOutcome, PatchStatus, PatchTargets, STOCK_DOMAIN, STOCK_INVITE_URL,
    STOCK_SUBDOMAIN_LABELS, STOCK_TELEMETRY_URL,
};
pub use record::{PATCHER_VERSION, PatchRecord, flag_path, load as load_record, save as save_record};
pub use strategy::{
    DEFAULT_DOMAIN, DIRECT_MAX_LEN, DOMAIN_MAX_LEN, DOMAIN_MIN_LEN, DomainStrategy, PatchMode,
    SPLIT_PREFIX_LEN,
};
