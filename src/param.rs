//! Parameter bindings and the linear-combination symbolic expression that
//! gate angles are resolved against (spec §3 "Parameter binding", §6
//! "Parameter expression interface").

use std::collections::{HashMap, HashSet};

use crate::math::R;

/// An immutable mapping from parameter name to real value, together with a
/// per-name "requires gradient" side-table.
///
/// Construction is the only place values change; evaluating an [`Expr`]
/// against a binding is a pure read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamResolver {
    values: HashMap<String, R>,
    requires_grad: HashSet<String>,
}

impl ParamResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, name: impl Into<String>, value: R, requires_grad: bool) -> Self {
        let name = name.into();
        self.values.insert(name.clone(), value);
        if requires_grad {
            self.requires_grad.insert(name);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<R> {
        self.values.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Names of parameters flagged as requiring a gradient, in a stable
    /// order (encoder names first, ansatz names second is a caller-level
    /// ordering concern — this just hands back the flagged set).
    pub fn requires_grad_names(&self) -> &HashSet<String> {
        &self.requires_grad
    }
}

/// A symbolic linear combination of named parameters plus a constant:
/// `const_value + sum_i coefficients[name_i] * binding[name_i]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Expr {
    pub const_value: R,
    pub coefficients: HashMap<String, R>,
}

impl Expr {
    pub fn constant(value: R) -> Self {
        Self {
            const_value: value,
            coefficients: HashMap::new(),
        }
    }

    pub fn linear(name: impl Into<String>, coefficient: R) -> Self {
        let mut coefficients = HashMap::new();
        coefficients.insert(name.into(), coefficient);
        Self {
            const_value: 0.0,
            coefficients,
        }
    }

    /// Evaluate against a binding: pure numeric linear combination.
    pub fn combination(&self, binding: &ParamResolver) -> R {
        self.coefficients.iter().fold(self.const_value, |acc, (name, coeff)| {
            acc + coeff * binding.get(name).unwrap_or(0.0)
        })
    }

    /// Names in this expression that the binding flags as gradient-requiring.
    pub fn requires_grad_names<'a>(&'a self, binding: &'a ParamResolver) -> impl Iterator<Item = &'a str> {
        self.coefficients
            .keys()
            .filter(move |name| binding.requires_grad_names().contains(name.as_str()))
            .map(|s| s.as_str())
    }

    #[inline]
    pub fn coefficient(&self, name: &str) -> R {
        self.coefficients.get(name).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combination_evaluates_linear_expression() {
        let binding = ParamResolver::new().with_value("theta", 1.5, true);
        let expr = Expr::linear("theta", 2.0);
        assert_eq!(expr.combination(&binding), 3.0);
    }

    #[test]
    fn requires_grad_filters_unflagged_names() {
        let binding = ParamResolver::new()
            .with_value("theta", 1.0, true)
            .with_value("phi", 2.0, false);
        let mut expr = Expr::linear("theta", 1.0);
        expr.coefficients.insert("phi".into(), 1.0);

        let names: Vec<_> = expr.requires_grad_names(&binding).collect();
        assert_eq!(names, vec!["theta"]);
    }
}
