use crate::formula::FormulaWarning;
use crate::schema::FormulaDefinition;
use crate::value::{PrimitiveKind, PrimitiveValue};

/// A string, number or boolean leaf.
///
/// `base_value` is the last committed value; the node is dirty while the two
/// differ.
#[derive(Debug, Clone)]
pub struct PrimitiveNode {
    value: PrimitiveValue,
    base_value: PrimitiveValue,
    formula: Option<FormulaDefinition>,
    formula_warning: Option<FormulaWarning>,
}

impl PrimitiveNode {
    pub(crate) fn new(value: PrimitiveValue, formula: Option<FormulaDefinition>) -> Self {
        Self {
            base_value: value.clone(),
            value,
            formula,
            formula_warning: None,
        }
    }

    pub fn value(&self) -> &PrimitiveValue {
        &self.value
    }

    pub fn base_value(&self) -> &PrimitiveValue {
        &self.base_value
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.value.kind()
    }

    pub fn is_dirty(&self) -> bool {
        self.value != self.base_value
    }

    pub fn formula(&self) -> Option<&FormulaDefinition> {
        self.formula.as_ref()
    }

    pub fn has_formula(&self) -> bool {
        self.formula.is_some()
    }

    pub fn formula_warning(&self) -> Option<&FormulaWarning> {
        self.formula_warning.as_ref()
    }

    /// Returns whether the value changed.
    pub(crate) fn set(&mut self, value: PrimitiveValue) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        true
    }

    /// Make the current value the baseline as well.
    pub(crate) fn rebase(&mut self) {
        self.base_value = self.value.clone();
    }

    pub(crate) fn set_formula_warning(&mut self, warning: Option<FormulaWarning>) {
        self.formula_warning = warning;
    }

    pub(crate) fn commit(&mut self) {
        self.rebase();
    }

    /// Returns whether the value changed.
    pub(crate) fn revert(&mut self) -> bool {
        let base = self.base_value.clone();
        self.set(base)
    }
}
