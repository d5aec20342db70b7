// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Post-hoc renumbering of discovered patterns.

use ms_core::{MsError, PatternSet, validate_permutation};

/// Output of a canonicalization: labels and patterns renumbered consistently.
#[derive(Clone, Debug, PartialEq)]
pub struct Relabeling {
    pub assignment: Vec<usize>,
    pub patterns: PatternSet,
    /// `order[new] = old`.
    pub order: Vec<usize>,
}

impl Relabeling {
    /// Applies the same renumbering to a per-pattern vector.
    pub fn reorder_values<T: Clone>(&self, values: &[T]) -> Result<Vec<T>, MsError> {
        if values.len() != self.order.len() {
            return Err(MsError::invalid_input(format!(
                "per-pattern vector has length {}; expected k={}",
                values.len(),
                self.order.len()
            )));
        }
        Ok(self.order.iter().map(|&old| values[old].clone()).collect())
    }
}

/// Chooses a stable numbering of the patterns.
///
/// Implementations only pick the order; [`Canonicalizer::canonicalize`]
/// validates it and applies it to both labels and patterns.
pub trait Canonicalizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `order` with `order[new] = old`. Must be a permutation of `0..k`.
    fn order(&self, assignment: &[usize], patterns: &PatternSet) -> Vec<usize>;

    fn canonicalize(
        &self,
        assignment: &[usize],
        patterns: &PatternSet,
    ) -> Result<Relabeling, MsError> {
        let k = patterns.k();
        if let Some((t, &label)) = assignment.iter().enumerate().find(|(_, l)| **l >= k) {
            return Err(MsError::invalid_input(format!(
                "assignment at sample {t} is {label}, outside [0, {k})"
            )));
        }

        let order = self.order(assignment, patterns);
        validate_permutation(&order, k)?;

        let mut new_index = vec![0usize; k];
        for (new, &old) in order.iter().enumerate() {
            new_index[old] = new;
        }

        Ok(Relabeling {
            assignment: assignment.iter().map(|&old| new_index[old]).collect(),
            patterns: patterns.reorder(&order)?,
            order,
        })
    }
}

/// Most frequent pattern first; ties keep the original order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrevalenceOrder;

impl Canonicalizer for PrevalenceOrder {
    fn name(&self) -> &'static str {
        "prevalence"
    }

    fn order(&self, assignment: &[usize], patterns: &PatternSet) -> Vec<usize> {
        let mut counts = vec![0usize; patterns.k()];
        for &label in assignment {
            if let Some(count) = counts.get_mut(label) {
                *count += 1;
            }
        }
        let mut order: Vec<usize> = (0..patterns.k()).collect();
        // Stable sort keeps ascending index among equal counts.
        order.sort_by(|&a, &b| counts[b].cmp(&counts[a]));
        order
    }
}

/// Keeps the numbering produced by the clustering fit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IdentityOrder;

impl Canonicalizer for IdentityOrder {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn order(&self, _assignment: &[usize], patterns: &PatternSet) -> Vec<usize> {
        (0..patterns.k()).collect()
    }
}
