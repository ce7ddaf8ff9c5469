use trellis_model::{ControlSelection, ProfileImport};

/// Outcome of matching one control against a filter
///
/// `applies_to_children` is the inherited state passed as the children's
/// `default_match` when descending, enabling an ancestor matched
/// with-children to implicitly include descendants unless explicitly
/// excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterMatch {
    pub matched: bool,
    pub applies_to_children: bool,
}

impl FilterMatch {
    /// Positive match applying to children
    pub const MATCH: FilterMatch = FilterMatch {
        matched: true,
        applies_to_children: true,
    };

    /// Negative match applying to children
    pub const NON_MATCH: FilterMatch = FilterMatch {
        matched: false,
        applies_to_children: false,
    };
}

/// One exact-identifier selection rule
///
/// Matching is exact-string after normalization; a rule that never matches
/// anything is silently inert.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRule {
    pub control_id: String,
    pub with_child_controls: bool,
}

/// Predicate algebra over control identifiers
///
/// Evaluation is total: every control resolves to a match outcome, never an
/// error.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlSelectionFilter {
    /// Matches every control, recursing to children
    AllMatch,
    /// Matches nothing
    NoneMatch,
    /// Matches controls named by a rule, carrying that rule's recursion flag
    Rules(Vec<SelectionRule>),
}

impl ControlSelectionFilter {
    /// Build a rule-based filter from profile selection clauses
    ///
    /// An empty clause list yields `NoneMatch`.
    pub fn from_selections(selections: &[ControlSelection]) -> Self {
        if selections.is_empty() {
            return ControlSelectionFilter::NoneMatch;
        }

        let rules = selections
            .iter()
            .flat_map(|selection| {
                selection.with_ids.iter().map(|id| SelectionRule {
                    control_id: id.clone(),
                    with_child_controls: selection.with_child_controls,
                })
            })
            .collect();
        ControlSelectionFilter::Rules(rules)
    }

    /// Evaluate this filter against a control identifier
    pub fn apply(&self, control_id: &str) -> FilterMatch {
        match self {
            ControlSelectionFilter::AllMatch => FilterMatch::MATCH,
            ControlSelectionFilter::NoneMatch => FilterMatch::NON_MATCH,
            ControlSelectionFilter::Rules(rules) => rules
                .iter()
                .find(|rule| rule.control_id == control_id)
                .map(|rule| FilterMatch {
                    matched: true,
                    applies_to_children: rule.with_child_controls,
                })
                .unwrap_or(FilterMatch::NON_MATCH),
        }
    }
}

/// Composite inclusion/exclusion filter of one import statement
#[derive(Debug, Clone, PartialEq)]
pub struct ControlFilter {
    inclusion: ControlSelectionFilter,
    exclusion: ControlSelectionFilter,
}

impl ControlFilter {
    /// Build a filter from explicit inclusion and exclusion parts
    pub fn new(inclusion: ControlSelectionFilter, exclusion: ControlSelectionFilter) -> Self {
        Self {
            inclusion,
            exclusion,
        }
    }

    /// Filter matching every control
    pub fn always_match() -> Self {
        Self::new(
            ControlSelectionFilter::AllMatch,
            ControlSelectionFilter::NoneMatch,
        )
    }

    /// Filter matching nothing
    pub fn never_match() -> Self {
        Self::new(
            ControlSelectionFilter::NoneMatch,
            ControlSelectionFilter::NoneMatch,
        )
    }

    /// Build the filter declared by an import statement
    ///
    /// `include_all` wins over include rules; an import with neither selects
    /// nothing, which is accepted rather than an error.
    pub fn from_import(import: &ProfileImport) -> Self {
        let inclusion = if import.include_all.is_some() {
            ControlSelectionFilter::AllMatch
        } else {
            ControlSelectionFilter::from_selections(&import.include_controls)
        };
        let exclusion = ControlSelectionFilter::from_selections(&import.exclude_controls);
        Self::new(inclusion, exclusion)
    }

    /// The inclusion part
    pub fn inclusion(&self) -> &ControlSelectionFilter {
        &self.inclusion
    }

    /// The exclusion part
    pub fn exclusion(&self) -> &ControlSelectionFilter {
        &self.exclusion
    }

    /// Match one control, with `default_match` as the inherited state
    ///
    /// An inclusion hit that is also an exclusion hit resolves to
    /// `NON_MATCH`: exclusion always overrides inclusion. Without an
    /// inclusion hit, the inherited `default_match` decides.
    pub fn matches(&self, control_id: &str, default_match: bool) -> FilterMatch {
        let included = self.inclusion.apply(control_id);
        if included.matched {
            if self.exclusion.apply(control_id).matched {
                FilterMatch::NON_MATCH
            } else {
                included
            }
        } else if default_match {
            FilterMatch::MATCH
        } else {
            FilterMatch::NON_MATCH
        }
    }
}
