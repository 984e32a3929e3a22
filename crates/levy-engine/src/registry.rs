//! # Tax Rule Registry
//!
//! Owns the tax rules, the custom validation rules and the audit trail.
//!
//! ## Mutation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     add_rule / update_rule                              │
//! │                                                                         │
//! │  candidate ──► validate (structural + custom) ──✗──► InvalidRule        │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │             find conflicts (excluding the rule being updated)           │
//! │                      │ ──✗──► Conflict                                  │
//! │                      ▼                                                  │
//! │             store + append ONE audit entry                              │
//! │                                                                         │
//! │  Any failure leaves the registry exactly as it was.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Storage
//! Rules live in an id-keyed map. A separate id list holds the iteration
//! order: insertion order until [`TaxRuleRegistry::optimize_rules`] sorts it
//! by name. Priority order for matching is recomputed on every read by the
//! matcher, never stored.
//!
//! ## Concurrency
//! There is no internal locking. Reads take `&self` and can run in
//! parallel; every mutation takes `&mut self`, so the borrow checker
//! enforces a single writer. Callers sharing a registry across threads wrap
//! it in an `RwLock`.

use chrono::{DateTime, Utc};
use levy_core::{
    AuditAction, Jurisdiction, TaxAuditTrail, TaxRule, TaxType, TaxValidationRule,
    ValidationError, REGISTRY_DOCUMENT_VERSION,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

use crate::config::TaxConfig;
use crate::conflict::{find_rule_conflicts, ConflictKind};
use crate::error::{EngineError, EngineResult};
use crate::validator::validate_with;

/// Audit `rule_id` used for registry-wide operations.
pub const ALL_RULES: &str = "*";

// =============================================================================
// Interchange Document
// =============================================================================

/// Logical export of a registry.
///
/// The byte format is the persistence layer's business; JSON helpers are
/// provided because that is what most callers store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    pub rules: Vec<TaxRule>,
    #[serde(default)]
    pub validation_rules: Vec<TaxValidationRule>,
    #[serde(default)]
    pub configuration: TaxConfig,
    pub export_date: DateTime<Utc>,
    pub version: String,
}

impl RegistryDocument {
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Rule counts by classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStatistics {
    pub total_rules: usize,
    pub active_rules: usize,
    pub inactive_rules: usize,
    pub validation_rules: usize,
    pub by_jurisdiction: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub by_method: BTreeMap<String, usize>,
}

// =============================================================================
// Registry
// =============================================================================

/// In-memory registry of tax rules.
#[derive(Debug, Clone, Default)]
pub struct TaxRuleRegistry {
    rules: BTreeMap<String, TaxRule>,
    order: Vec<String>,
    validation_rules: BTreeMap<String, TaxValidationRule>,
    audit_trail: Vec<TaxAuditTrail>,
    config: TaxConfig,
}

impl TaxRuleRegistry {
    /// Creates an empty registry with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry carrying `config`.
    pub fn with_config(config: TaxConfig) -> Self {
        TaxRuleRegistry {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &TaxConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: TaxConfig) {
        self.config = config;
    }

    // =========================================================================
    // Rule CRUD
    // =========================================================================

    /// Validates, conflict-checks and stores a new rule.
    pub fn add_rule(&mut self, rule: TaxRule) -> EngineResult<()> {
        self.check_candidate(&rule, None)?;

        info!(rule_id = %rule.id, name = %rule.name, "Adding tax rule");
        let reason = format!("created rule '{}'", rule.name);
        self.order.push(rule.id.clone());
        self.record(AuditAction::Created, &rule.id, reason);
        self.rules.insert(rule.id.clone(), rule);
        Ok(())
    }

    /// Replaces the rule stored under `id`.
    ///
    /// The replacement may carry a new id; it is then conflict-checked like
    /// any other id, and keeps the old rule's position in iteration order.
    pub fn update_rule(&mut self, id: &str, rule: TaxRule) -> EngineResult<()> {
        if !self.rules.contains_key(id) {
            return Err(EngineError::RuleNotFound(id.to_string()));
        }
        self.check_candidate(&rule, Some(id))?;

        info!(rule_id = %id, new_id = %rule.id, "Updating tax rule");
        self.rules.remove(id);
        if let Some(slot) = self.order.iter_mut().find(|slot| slot.as_str() == id) {
            *slot = rule.id.clone();
        }
        let reason = format!("updated rule '{}'", rule.name);
        self.record(AuditAction::Updated, &rule.id, reason);
        self.rules.insert(rule.id.clone(), rule);
        Ok(())
    }

    /// Removes and returns a rule.
    pub fn remove_rule(&mut self, id: &str) -> EngineResult<TaxRule> {
        let rule = self
            .rules
            .remove(id)
            .ok_or_else(|| EngineError::RuleNotFound(id.to_string()))?;
        self.order.retain(|slot| slot != id);

        info!(rule_id = %id, "Removed tax rule");
        self.record(AuditAction::Removed, id, format!("removed rule '{}'", rule.name));
        Ok(rule)
    }

    /// Looks up a rule by id.
    pub fn get_rule(&self, id: &str) -> EngineResult<&TaxRule> {
        self.rules
            .get(id)
            .ok_or_else(|| EngineError::RuleNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rules.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All rules in iteration order.
    pub fn rules(&self) -> impl Iterator<Item = &TaxRule> + '_ {
        self.order.iter().filter_map(move |id| self.rules.get(id))
    }

    pub fn rules_by_jurisdiction(&self, jurisdiction: Jurisdiction) -> Vec<&TaxRule> {
        self.rules()
            .filter(|rule| rule.jurisdiction == jurisdiction)
            .collect()
    }

    pub fn rules_by_type(&self, tax_type: TaxType) -> Vec<&TaxRule> {
        self.rules().filter(|rule| rule.tax_type == tax_type).collect()
    }

    /// Rules that are active and in their validity window right now.
    pub fn active_rules(&self) -> Vec<&TaxRule> {
        self.active_rules_at(Utc::now())
    }

    /// Rules that are active and in their validity window at `at`.
    pub fn active_rules_at(&self, at: DateTime<Utc>) -> Vec<&TaxRule> {
        self.rules().filter(|rule| rule.is_in_effect(at)).collect()
    }

    /// All rules sorted by name (id breaks ties).
    pub fn rules_by_name(&self) -> Vec<&TaxRule> {
        let mut rules: Vec<&TaxRule> = self.rules.values().collect();
        rules.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        rules
    }

    // =========================================================================
    // Activation
    // =========================================================================

    pub fn activate_rule(&mut self, id: &str) -> EngineResult<()> {
        self.set_active(id, true)
    }

    pub fn deactivate_rule(&mut self, id: &str) -> EngineResult<()> {
        self.set_active(id, false)
    }

    fn set_active(&mut self, id: &str, active: bool) -> EngineResult<()> {
        let rule = self
            .rules
            .get_mut(id)
            .ok_or_else(|| EngineError::RuleNotFound(id.to_string()))?;
        let was_active = rule.is_active;
        rule.is_active = active;

        let (action, verb) = if active {
            (AuditAction::Activated, "activated")
        } else {
            (AuditAction::Deactivated, "deactivated")
        };
        debug!(rule_id = %id, was_active, active, "Toggled tax rule");
        self.record(action, id, format!("{} rule (was active: {})", verb, was_active));
        Ok(())
    }

    // =========================================================================
    // Validation Rules
    // =========================================================================

    /// Registers a custom validation rule. It applies to future mutations
    /// only; run [`validate_rules`](Self::validate_rules) to re-check
    /// existing rules.
    pub fn add_validation_rule(&mut self, validation_rule: TaxValidationRule) -> EngineResult<()> {
        if self.validation_rules.contains_key(&validation_rule.id) {
            return Err(EngineError::DuplicateValidationRule(validation_rule.id));
        }

        let id = validation_rule.id.clone();
        let reason = format!("added {} validation rule", validation_rule.rule_type);
        self.validation_rules.insert(id.clone(), validation_rule);
        self.record(AuditAction::ValidationRuleAdded, &id, reason);
        Ok(())
    }

    pub fn remove_validation_rule(&mut self, id: &str) -> EngineResult<TaxValidationRule> {
        let removed = self
            .validation_rules
            .remove(id)
            .ok_or_else(|| EngineError::ValidationRuleNotFound(id.to_string()))?;
        let reason = format!("removed {} validation rule", removed.rule_type);
        self.record(AuditAction::ValidationRuleRemoved, id, reason);
        Ok(removed)
    }

    pub fn validation_rules(&self) -> impl Iterator<Item = &TaxValidationRule> + '_ {
        self.validation_rules.values()
    }

    /// Re-validates every stored rule without failing fast.
    ///
    /// Returns only rules that have errors, keyed by rule id.
    pub fn validate_rules(&self) -> BTreeMap<String, Vec<ValidationError>> {
        self.rules()
            .filter_map(|rule| {
                let errors = validate_with(rule, self.validation_rules.values());
                (!errors.is_empty()).then(|| (rule.id.clone(), errors))
            })
            .collect()
    }

    // =========================================================================
    // Ordering, Interchange, Statistics
    // =========================================================================

    /// Sorts the iteration order by rule name (stable).
    ///
    /// This makes iteration, export and matching tie-breaks reproducible
    /// across registries built in different insertion orders.
    pub fn optimize_rules(&mut self) {
        let rules = &self.rules;
        self.order.sort_by(|a, b| {
            let name_a = rules.get(a).map(|r| r.name.as_str()).unwrap_or_default();
            let name_b = rules.get(b).map(|r| r.name.as_str()).unwrap_or_default();
            name_a.cmp(name_b)
        });
        let reason = format!("sorted {} rules by name", self.order.len());
        self.record(AuditAction::Optimized, ALL_RULES, reason);
    }

    /// Exports rules, validation rules and configuration.
    pub fn export_rules(&self) -> RegistryDocument {
        RegistryDocument {
            rules: self.rules().cloned().collect(),
            validation_rules: self.validation_rules.values().cloned().collect(),
            configuration: self.config.clone(),
            export_date: Utc::now(),
            version: REGISTRY_DOCUMENT_VERSION.to_string(),
        }
    }

    /// Replaces the registry contents with `document`.
    ///
    /// Every rule is validated against the document's own validation rules
    /// and conflict-checked against the rules before it. Nothing changes
    /// unless the whole document is accepted. Returns the number of rules
    /// imported.
    pub fn import_rules(&mut self, document: RegistryDocument) -> EngineResult<usize> {
        if document.version != REGISTRY_DOCUMENT_VERSION {
            return Err(EngineError::UnsupportedVersion {
                found: document.version,
                expected: REGISTRY_DOCUMENT_VERSION.to_string(),
            });
        }

        let mut seen_validation_ids = HashSet::new();
        for validation_rule in &document.validation_rules {
            if !seen_validation_ids.insert(validation_rule.id.as_str()) {
                return Err(EngineError::DuplicateValidationRule(validation_rule.id.clone()));
            }
        }

        for (index, rule) in document.rules.iter().enumerate() {
            let errors = validate_with(rule, &document.validation_rules);
            if !errors.is_empty() {
                return Err(EngineError::InvalidRule {
                    rule_id: rule.id.clone(),
                    errors,
                });
            }

            let conflicts = find_rule_conflicts(rule, &document.rules[..index]);
            if !conflicts.is_empty() {
                return Err(EngineError::Conflict {
                    rule_id: rule.id.clone(),
                    conflicts,
                });
            }
        }

        document.configuration.validate()?;

        let count = document.rules.len();
        self.order = document.rules.iter().map(|rule| rule.id.clone()).collect();
        self.rules = document
            .rules
            .into_iter()
            .map(|rule| (rule.id.clone(), rule))
            .collect();
        self.validation_rules = document
            .validation_rules
            .into_iter()
            .map(|v| (v.id.clone(), v))
            .collect();
        self.config = document.configuration;

        info!(count, exported_at = %document.export_date, "Imported tax rules");
        self.record(
            AuditAction::Imported,
            ALL_RULES,
            format!("imported {} rules exported at {}", count, document.export_date),
        );
        Ok(count)
    }

    /// Counts rules by jurisdiction, type, method and activation state.
    pub fn statistics(&self) -> RegistryStatistics {
        let mut stats = RegistryStatistics {
            total_rules: self.rules.len(),
            validation_rules: self.validation_rules.len(),
            ..RegistryStatistics::default()
        };

        for rule in self.rules.values() {
            if rule.is_active {
                stats.active_rules += 1;
            } else {
                stats.inactive_rules += 1;
            }
            *stats
                .by_jurisdiction
                .entry(rule.jurisdiction.as_str().to_string())
                .or_default() += 1;
            *stats.by_type.entry(rule.tax_type.as_str().to_string()).or_default() += 1;
            *stats.by_method.entry(rule.method.as_str().to_string()).or_default() += 1;
        }

        stats
    }

    // =========================================================================
    // Audit Trail
    // =========================================================================

    pub fn audit_trail(&self) -> &[TaxAuditTrail] {
        &self.audit_trail
    }

    pub fn clear_audit_trail(&mut self) {
        self.audit_trail.clear();
    }

    fn record(&mut self, action: AuditAction, rule_id: &str, reason: String) {
        self.audit_trail.push(TaxAuditTrail {
            action,
            rule_id: rule_id.to_string(),
            reason,
            timestamp: Utc::now(),
        });
    }

    /// Validation then conflict detection; `replacing` is excluded from the
    /// conflict scan.
    fn check_candidate(&self, rule: &TaxRule, replacing: Option<&str>) -> EngineResult<()> {
        let errors = validate_with(rule, self.validation_rules.values());
        if !errors.is_empty() {
            debug!(rule_id = %rule.id, count = errors.len(), "Rejected invalid tax rule");
            return Err(EngineError::InvalidRule {
                rule_id: rule.id.clone(),
                errors,
            });
        }

        let others = self
            .rules
            .values()
            .filter(|existing| Some(existing.id.as_str()) != replacing);
        let conflicts = find_rule_conflicts(rule, others);
        if !conflicts.is_empty() {
            debug!(
                rule_id = %rule.id,
                duplicate = conflicts.iter().any(|c| c.kind == ConflictKind::DuplicateId),
                count = conflicts.len(),
                "Rejected conflicting tax rule"
            );
            return Err(EngineError::Conflict {
                rule_id: rule.id.clone(),
                conflicts,
            });
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
