//! Disclosure policy for failure details
//!
//! One [`SanitizationResult`] is computed per resolution and shared by the response body and
//! the span enricher, so clients and telemetry agree on what was disclosed. Outside
//! developer environments the default is to redact unless the fault kind is allow-listed.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::environment::HostEnvironment;
use crate::fault::Fault;

/// Extra hook deciding whether a fault's raw details may be disclosed.
pub type DisclosurePredicate = Arc<dyn Fn(&Fault) -> bool + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[allow(clippy::struct_excessive_bools)]
pub struct SanitizerConfig {
    /// Detail sent whenever the real one is withheld.
    pub redacted_detail: String,
    pub include_stack_trace_in_development: bool,
    /// Append the raw message and its source kind to the detail in developer environments.
    pub augment_detail_in_development: bool,
    /// Fault kinds (see [`Fault::kind_name`]) whose details are always safe to disclose.
    pub safe_kinds: Vec<String>,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            redacted_detail: "An unexpected error occurred.".to_owned(),
            include_stack_trace_in_development: true,
            augment_detail_in_development: true,
            safe_kinds: ["validation", "not_found", "authorization", "rate_limit", "domain"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// Outcome of the disclosure decision for one failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizationResult {
    pub detail: String,
    pub include_stack_trace: bool,
    pub is_redacted: bool,
}

#[derive(Clone)]
pub struct Sanitizer {
    config: SanitizerConfig,
    environment: HostEnvironment,
    predicate: Option<DisclosurePredicate>,
}

impl fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sanitizer")
            .field("config", &self.config)
            .field("environment", &self.environment)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

impl Sanitizer {
    #[must_use]
    pub fn new(config: SanitizerConfig, environment: HostEnvironment) -> Self {
        Self {
            config,
            environment,
            predicate: None,
        }
    }

    #[must_use]
    pub fn with_predicate(mut self, predicate: DisclosurePredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    #[must_use]
    pub fn environment(&self) -> &HostEnvironment {
        &self.environment
    }

    #[must_use]
    pub fn redacted_detail(&self) -> &str {
        &self.config.redacted_detail
    }

    /// Decides what detail may be disclosed for `fault`.
    ///
    /// `preferred_detail` is the mapper's caller-facing text; when
    /// `treat_preferred_as_sensitive` is set it is only used if sensitive disclosure is allowed.
    /// Blank preferred details count as absent.
    #[must_use]
    pub fn sanitize(
        &self,
        ctx: &RequestContext,
        fault: &Fault,
        preferred_detail: Option<&str>,
        treat_preferred_as_sensitive: bool,
    ) -> SanitizationResult {
        let include_sensitive = self.include_sensitive(fault);
        let preferred = preferred_detail.filter(|d| !d.trim().is_empty());

        let detail = match preferred {
            Some(p) if !treat_preferred_as_sensitive || include_sensitive => {
                self.augment(Some(p), fault)
            }
            None if include_sensitive => self.augment(None, fault),
            _ => self.config.redacted_detail.clone(),
        };

        if !include_sensitive {
            tracing::trace!(
                trace_id = %ctx.trace_id(),
                kind = fault.kind_name(),
                "fault details redacted"
            );
        }

        SanitizationResult {
            detail,
            include_stack_trace: include_sensitive
                && self.environment.is_developer()
                && self.config.include_stack_trace_in_development,
            is_redacted: !include_sensitive,
        }
    }

    fn include_sensitive(&self, fault: &Fault) -> bool {
        let kind = fault.kind_name();
        self.environment.is_developer()
            || self
                .config
                .safe_kinds
                .iter()
                .any(|safe| safe.eq_ignore_ascii_case(kind))
            || self.predicate.as_ref().is_some_and(|allow| allow(fault))
    }

    /// `"<preferred> | <message> (source: <kind>)"` in developer environments, otherwise the
    /// preferred detail or raw message unchanged.
    fn augment(&self, preferred: Option<&str>, fault: &Fault) -> String {
        let message = fault.to_string();
        let message = if message.trim().is_empty() {
            "An error was raised.".to_owned()
        } else {
            message
        };

        if !(self.environment.is_developer() && self.config.augment_detail_in_development) {
            return preferred.map_or(message, str::to_owned);
        }

        let base = match preferred {
            Some(p) if p.contains(&message) => p.to_owned(),
            Some(p) => format!("{p} | {message}"),
            None => message,
        };
        format!("{base} (source: {})", fault.kind_name())
    }
}
