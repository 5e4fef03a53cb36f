//! Authorization gate over `(peer, key)` pairs.
//!
//! Rules are evaluated in insertion order and evaluation stops at the first
//! rule that denies. An empty gate allows everything.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::trace;

/// A single authorization rule.
pub trait GateRule<P, K>: Send + Sync {
    /// Rule name, reported when the rule denies.
    fn name(&self) -> &str;

    /// Whether an update of `key` may be delivered to `peer`.
    fn allows(&self, peer: &P, key: &K) -> bool;
}

/// Adapts a predicate closure to a [`GateRule`].
pub struct FnRule<F> {
    name: String,
    f: F,
}

impl<F> FnRule<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<P, K, F> GateRule<P, K> for FnRule<F>
where
    F: Fn(&P, &K) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn allows(&self, peer: &P, key: &K) -> bool {
        (self.f)(peer, key)
    }
}

/// Outcome of evaluating the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    /// Denied by the named rule.
    Deny { rule: String },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }

    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }
}

type Rules<P, K> = Vec<Arc<dyn GateRule<P, K>>>;

/// Ordered set of authorization rules.
pub struct AuthorizationGate<P, K> {
    rules: ArcSwap<Rules<P, K>>,
}

impl<P, K> AuthorizationGate<P, K> {
    pub fn new() -> Self {
        Self {
            rules: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Append a rule.
    pub fn add_gate_rule(&self, rule: Arc<dyn GateRule<P, K>>) {
        self.rules.rcu(|rules| {
            let mut next = Vec::with_capacity(rules.len() + 1);
            next.extend(rules.iter().cloned());
            next.push(rule.clone());
            next
        });
    }

    /// Append a predicate, named after its position.
    pub fn add_rule<F>(&self, predicate: F)
    where
        F: Fn(&P, &K) -> bool + Send + Sync + 'static,
        P: 'static,
        K: 'static,
    {
        let name = format!("rule-{}", self.rule_count());
        self.add_gate_rule(Arc::new(FnRule::new(name, predicate)));
    }

    /// Append a named predicate.
    pub fn add_named_rule<F>(&self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&P, &K) -> bool + Send + Sync + 'static,
        P: 'static,
        K: 'static,
    {
        self.add_gate_rule(Arc::new(FnRule::new(name, predicate)));
    }

    pub fn rule_count(&self) -> usize {
        self.rules.load().len()
    }

    /// Evaluate every rule in order, stopping at the first denial.
    pub fn evaluate(&self, peer: &P, key: &K) -> GateDecision {
        let rules = self.rules.load();
        for rule in rules.iter() {
            if !rule.allows(peer, key) {
                trace!(rule = %rule.name(), "Gate rule denied");
                return GateDecision::Deny {
                    rule: rule.name().to_string(),
                };
            }
        }
        GateDecision::Allow
    }

    /// Whether an update of `key` may be delivered to `peer`.
    pub fn is_allowed(&self, peer: &P, key: &K) -> bool {
        self.evaluate(peer, key).is_allowed()
    }
}

impl<P, K> Default for AuthorizationGate<P, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, K> fmt::Debug for AuthorizationGate<P, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("rules", &self.rule_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    type Gate = AuthorizationGate<String, String>;

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn test_empty_gate_allows() {
        let gate = Gate::new();
        assert!(gate.is_allowed(&s("p1"), &s("k")));
        assert_eq!(gate.evaluate(&s("p1"), &s("k")), GateDecision::Allow);
    }

    #[test]
    fn test_all_rules_must_pass() {
        let gate = Gate::new();
        gate.add_rule(|_, _| true);
        gate.add_rule(|_, _| false);

        let decision = gate.evaluate(&s("p1"), &s("k"));
        assert!(decision.is_denied());
        assert_eq!(decision, GateDecision::Deny { rule: s("rule-1") });
        assert!(!gate.is_allowed(&s("p1"), &s("k")));
    }

    #[test]
    fn test_short_circuits_on_first_denial() {
        let gate = Gate::new();
        let calls = Arc::new(AtomicU32::new(0));

        gate.add_named_rule("deny-all", |_, _| false);
        let c = calls.clone();
        gate.add_rule(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
            true
        });

        assert_eq!(
            gate.evaluate(&s("p1"), &s("k")),
            GateDecision::Deny { rule: s("deny-all") }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rules_see_peer_and_key() {
        let gate = Gate::new();
        gate.add_named_rule("admins-only-secrets", |peer: &String, key: &String| {
            !key.starts_with("secret:") || peer == "admin"
        });

        assert!(gate.is_allowed(&s("admin"), &s("secret:1")));
        assert!(!gate.is_allowed(&s("guest"), &s("secret:1")));
        assert!(gate.is_allowed(&s("guest"), &s("score")));
        assert_eq!(gate.rule_count(), 1);
    }
}
