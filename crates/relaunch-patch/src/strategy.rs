//! Domain replacement strategy.
//!
//! Short domains fit straight into the original base-domain slot; longer ones
//! are split so the first six characters ride in a subdomain-prefix slot and
//! the remainder replaces the base domain. Both halves stay within the byte
//! budget of the strings they overwrite.

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DOMAIN_MIN_LEN: usize = 4;
pub const DOMAIN_MAX_LEN: usize = 16;
/// Domains longer than this cannot fit the base-domain slot and are split.
pub const DIRECT_MAX_LEN: usize = 10;
pub const SPLIT_PREFIX_LEN: usize = 6;

/// Substituted when the configured domain falls outside the supported range.
pub const DEFAULT_DOMAIN: &str = "cradle.gg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchMode {
    Direct,
    Split,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainStrategy {
    Direct { domain: String },
    Split { prefix: String, suffix: String },
}

impl DomainStrategy {
    /// Strategy for a configured target domain, substituting the built-in
    /// default when the length is unsupported. Returns the strategy and the
    /// effective target domain it encodes.
    pub fn derive(target: &str) -> (DomainStrategy, String) {
        let effective = if (DOMAIN_MIN_LEN..=DOMAIN_MAX_LEN).contains(&target.len()) {
            target.to_string()
        } else {
            warn!(
                target,
                len = target.len(),
                default = DEFAULT_DOMAIN,
                "target domain length unsupported, substituting default"
            );
            DEFAULT_DOMAIN.to_string()
        };

        let strategy = if effective.len() <= DIRECT_MAX_LEN {
            DomainStrategy::Direct {
                domain: effective.clone(),
            }
        } else {
            let (prefix, suffix) = effective.split_at(SPLIT_PREFIX_LEN);
            DomainStrategy::Split {
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            }
        };
        (strategy, effective)
    }

    pub fn mode(&self) -> PatchMode {
        match self {
            DomainStrategy::Direct { .. } => PatchMode::Direct,
            DomainStrategy::Split { .. } => PatchMode::Split,
        }
    }

    /// The domain the patched binary is expected to contain; this is what the
    /// status check scans for.
    pub fn main_domain(&self) -> &str {
        match self {
            DomainStrategy::Direct { domain } => domain,
            DomainStrategy::Split { suffix, .. } => suffix,
        }
    }

    pub fn subdomain_prefix(&self) -> Option<&str> {
        match self {
            DomainStrategy::Direct { .. } => None,
            DomainStrategy::Split { prefix, .. } => Some(prefix),
        }
    }

    /// Replacement host for an occurrence of the bare original domain.
    pub fn host_for_base(&self) -> String { self.main_domain().to_string() }

    /// Replacement host for `label.<original>`. Direct mode collapses
    /// subdomain labels onto the base domain; split mode maps every label to
    /// the prefix half.
    pub fn host_for_label(&self, _label: &str) -> String {
        match self {
            DomainStrategy::Direct { domain } => domain.clone(),
            DomainStrategy::Split { prefix, suffix } => format!("{prefix}.{suffix}"),
        }
    }

    /// Map an original host (base domain or `label.base`) to its replacement.
    pub fn map_host(&self, host: &str, original_domain: &str) -> Option<String> {
        if host == original_domain {
            Some(self.host_for_base())
        } else {
            host.strip_suffix(original_domain)
                .and_then(|rest| rest.strip_suffix('.'))
                .map(|label| self.host_for_label(label))
        }
    }
}
