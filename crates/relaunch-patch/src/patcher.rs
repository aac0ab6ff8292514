//! The binary domain patcher.
//!
//! Every patch attempt leaves the binary in exactly one of two states, fully
//! original or fully patched: the rewrite is planned and applied against an
//! in-memory copy, then written out in a single temp-file-and-rename pass
//! only after every replacement has been decided.

use std::ops::Range;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::backup;
use crate::encoding::{Encoder, LengthPrefixed, Utf16Le, find_occurrences};
use crate::error::PatchError;
use crate::record::{self, PATCHER_VERSION, PatchRecord};
use crate::strategy::{DomainStrategy, PatchMode};

pub const STOCK_DOMAIN: &str = "cradlegame.com";
pub const STOCK_SUBDOMAIN_LABELS: [&str; 4] = ["tools", "session", "account", "telemetry"];
pub const STOCK_TELEMETRY_URL: &str = "https://telemetry.cradlegame.com/api/v1/crash";
pub const STOCK_INVITE_URL: &str = "https://discord.gg/cradlegame";

/// What to look for in the binary and what to put in its place.
#[derive(Debug, Clone)]
pub struct PatchTargets {
    pub original_domain:  String,
    pub subdomain_labels: Vec<String>,
    pub telemetry_url:    String,
    pub invite_url:       String,
    pub new_invite_url:   String,
}

impl Default for PatchTargets {
    fn default() -> Self {
        Self {
            original_domain:  STOCK_DOMAIN.to_string(),
            subdomain_labels: STOCK_SUBDOMAIN_LABELS.iter().map(|s| s.to_string()).collect(),
            telemetry_url:    STOCK_TELEMETRY_URL.to_string(),
            invite_url:       STOCK_INVITE_URL.to_string(),
            new_invite_url:   "https://discord.gg/cradle".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStatus {
    Patched,
    Unpatched { restore_needed: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The binary already carries the configured domain; nothing was written.
    AlreadyPatched,
    Patched {
        replacements: usize,
        mode:         PatchMode,
    },
}

#[derive(Debug)]
struct Replacement {
    offset: usize,
    bytes:  Vec<u8>,
}

#[derive(Debug, Default)]
struct PatchPlan {
    replacements: Vec<Replacement>,
    skipped:      usize,
}

pub struct DomainPatcher {
    binary:  PathBuf,
    targets: PatchTargets,
}

impl DomainPatcher {
    pub fn new(binary: impl Into<PathBuf>, targets: PatchTargets) -> Self {
        Self {
            binary: binary.into(),
            targets,
        }
    }

    pub fn binary(&self) -> &Path { &self.binary }

    /// Compare the persisted record against the presently configured target,
    /// corroborated by scanning the binary. A record claiming a domain the
    /// binary no longer contains is not trusted.
    pub fn status(&self, configured_target: &str) -> Result<PatchStatus, PatchError> {
        let (_, effective) = DomainStrategy::derive(configured_target);
        self.status_for(&effective)
    }

    fn status_for(&self, effective_target: &str) -> Result<PatchStatus, PatchError> {
        let Some(existing) = record::load(&self.binary)? else {
            return Ok(PatchStatus::Unpatched {
                restore_needed: false,
            });
        };

        // Corroborate the record before honoring it in any direction. When the
        // recorded domain is absent the binary was replaced by an update; the
        // backup is stale, so restoring from it would revert the update. Patch
        // from scratch instead, whatever the configured target is.
        let buf = std::fs::read(&self.binary).map_err(|e| PatchError::io(&self.binary, e))?;
        if !contains_domain(&buf, &existing.main_domain) {
            debug!(domain = existing.main_domain, "recorded domain absent from binary");
            return Ok(PatchStatus::Unpatched {
                restore_needed: false,
            });
        }

        if existing.target_domain != effective_target {
            debug!(
                recorded = existing.target_domain,
                configured = effective_target,
                "patch record targets a different domain"
            );
            return Ok(PatchStatus::Unpatched {
                restore_needed: true,
            });
        }

        Ok(PatchStatus::Patched)
    }

    /// Rewrite the binary for `configured_target`, idempotently.
    pub fn patch(&self, configured_target: &str) -> Result<PatchOutcome, PatchError> {
        if !self.binary.exists() {
            return Err(PatchError::BinaryNotFound {
                path: self.binary.clone(),
            });
        }

        let (strategy, effective) = DomainStrategy::derive(configured_target);

        match self.status_for(&effective)? {
            PatchStatus::Patched => {
                info!(target = effective, "binary already patched for configured domain");
                return Ok(PatchOutcome::AlreadyPatched);
            }
            PatchStatus::Unpatched {
                restore_needed: true,
            } => {
                info!("configured domain changed, restoring pristine binary first");
                backup::restore(&self.binary)?;
            }
            PatchStatus::Unpatched {
                restore_needed: false,
            } => {}
        }

        backup::ensure_backup(&self.binary)?;

        let mut buf = std::fs::read(&self.binary).map_err(|e| PatchError::io(&self.binary, e))?;
        let plan = self.plan(&buf, &strategy);

        if plan.replacements.is_empty() {
            warn!(
                binary = %self.binary.display(),
                "no known endpoint strings found in binary; nothing rewritten"
            );
        }
        for replacement in &plan.replacements {
            let end = replacement.offset + replacement.bytes.len();
            buf[replacement.offset..end].copy_from_slice(&replacement.bytes);
        }

        write_in_one_pass(&self.binary, &buf)?;

        let verified = contains_domain(&buf, strategy.main_domain());
        if !verified {
            warn!(
                domain = strategy.main_domain(),
                "patched binary does not contain the target domain; marking record unverified"
            );
        }

        record::save(
            &self.binary,
            &PatchRecord {
                patched_at:       Utc::now(),
                original_domain:  self.targets.original_domain.clone(),
                target_domain:    effective,
                patch_mode:       strategy.mode(),
                main_domain:      strategy.main_domain().to_string(),
                subdomain_prefix: strategy.subdomain_prefix().map(|s| s.to_string()),
                patcher_version:  PATCHER_VERSION.to_string(),
                verified,
            },
        )?;

        info!(
            replacements = plan.replacements.len(),
            skipped = plan.skipped,
            mode = ?strategy.mode(),
            "binary patched"
        );
        Ok(PatchOutcome::Patched {
            replacements: plan.replacements.len(),
            mode:         strategy.mode(),
        })
    }

    /// Decide every rewrite against the original buffer. Longer strings are
    /// planned first and claim their byte ranges, so a base-domain match
    /// inside an already-claimed subdomain string is never rewritten twice.
    fn plan(&self, buf: &[u8], strategy: &DomainStrategy) -> PatchPlan {
        let mut plan = PatchPlan::default();
        let mut claimed: Vec<Range<usize>> = Vec::new();

        if let Some(new_url) = rewrite_url(&self.targets.telemetry_url, strategy, &self.targets.original_domain) {
            plan_pair(
                buf,
                &self.targets.telemetry_url,
                &new_url,
                &mut claimed,
                &mut plan,
            );
        } else {
            warn!(
                url = self.targets.telemetry_url,
                "telemetry URL host is not under the original domain; skipping"
            );
        }

        for label in &self.targets.subdomain_labels {
            let old_host = format!("{label}.{}", self.targets.original_domain);
            plan_pair(
                buf,
                &old_host,
                &strategy.host_for_label(label),
                &mut claimed,
                &mut plan,
            );
        }

        plan_pair(
            buf,
            &self.targets.original_domain,
            &strategy.host_for_base(),
            &mut claimed,
            &mut plan,
        );

        // Community invite, length-prefixed first, UTF-16 as fallback; the
        // shared pair planner already tries them in that order.
        plan_pair(
            buf,
            &self.targets.invite_url,
            &self.targets.new_invite_url,
            &mut claimed,
            &mut plan,
        );

        plan
    }
}

/// Plan replacements for one `old -> new` string pair. The length-prefixed
/// encoding is tried first; UTF-16LE only when no length-prefixed occurrence
/// exists. In-place rewriting cannot grow the file, so an encoding that would
/// exceed the original's byte length is skipped, never expanded.
fn plan_pair(
    buf: &[u8],
    old: &str,
    new: &str,
    claimed: &mut Vec<Range<usize>>,
    plan: &mut PatchPlan,
) {
    let lp_old = LengthPrefixed.encode(old);
    let offsets = unclaimed(find_occurrences(buf, &lp_old), lp_old.len(), claimed);
    if !offsets.is_empty() {
        let lp_new = LengthPrefixed.encode(new);
        if lp_new.len() > lp_old.len() {
            warn!(old, new, "replacement does not fit length-prefixed slot; skipping");
            plan.skipped += offsets.len();
            return;
        }
        for offset in offsets {
            claimed.push(offset..offset + lp_old.len());
            // A shorter record rewrites the length prefix; stale bytes past
            // the new length are never read.
            plan.replacements.push(Replacement {
                offset,
                bytes: lp_new.clone(),
            });
        }
        return;
    }

    let u16_old = Utf16Le.encode(old);
    let offsets = unclaimed(find_occurrences(buf, &u16_old), u16_old.len(), claimed);
    if offsets.is_empty() {
        return;
    }
    let mut u16_new = Utf16Le.encode(new);
    if u16_new.len() > u16_old.len() {
        warn!(old, new, "replacement does not fit UTF-16 slot; skipping");
        plan.skipped += offsets.len();
        return;
    }
    // Zero-fill the remainder; UTF-16 strings here are NUL-terminated.
    u16_new.resize(u16_old.len(), 0);
    for offset in offsets {
        claimed.push(offset..offset + u16_old.len());
        plan.replacements.push(Replacement {
            offset,
            bytes: u16_new.clone(),
        });
    }
}

fn unclaimed(offsets: Vec<usize>, len: usize, claimed: &[Range<usize>]) -> Vec<usize> {
    offsets
        .into_iter()
        .filter(|&offset| {
            let candidate = offset..offset + len;
            !claimed
                .iter()
                .any(|range| candidate.start < range.end && range.start < candidate.end)
        })
        .collect()
}

/// Whether the buffer contains `domain` in either encoding.
fn contains_domain(buf: &[u8], domain: &str) -> bool {
    !find_occurrences(buf, &LengthPrefixed.encode(domain)).is_empty()
        || !find_occurrences(buf, &Utf16Le.encode(domain)).is_empty()
}

/// Rewrite a full URL onto the mapped host, keeping scheme and path suffix.
fn rewrite_url(url: &str, strategy: &DomainStrategy, original_domain: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let (host, path) = match rest.split_once('/') {
        Some((host, path)) => (host, format!("/{path}")),
        None => (rest, String::new()),
    };
    let new_host = strategy.map_host(host, original_domain)?;
    Some(format!("{scheme}://{new_host}{path}"))
}

fn write_in_one_pass(binary: &Path, buf: &[u8]) -> Result<(), PatchError> {
    let mut name = binary.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".patch.tmp");
    let tmp = binary.with_file_name(name);

    std::fs::write(&tmp, buf).map_err(|e| PatchError::io(&tmp, e))?;
    std::fs::rename(&tmp, binary).map_err(|e| PatchError::io(binary, e))?;
    Ok(())
}
