//! Name search over a replica view.

use std::sync::Arc;

use crate::cache::CaseView;
use crate::record::CaseRecord;

/// Returns the records whose name contains `term`, ignoring case.
///
/// Order is preserved. An empty term returns `view` itself.
pub fn apply(view: &CaseView, term: &str) -> CaseView {
    if term.is_empty() {
        return Arc::clone(view);
    }
    let needle = term.to_lowercase();
    view.iter()
        .filter(|record| matches(record, &needle))
        .cloned()
        .collect()
}

/// `needle` must already be lowercased.
fn matches(record: &CaseRecord, needle: &str) -> bool {
    !record.name.is_empty() && record.name.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn view(names: &[&str]) -> CaseView {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| CaseRecord {
                id: i.to_string(),
                name: name.to_string(),
                ..CaseRecord::default()
            })
            .collect()
    }

    fn names(view: &CaseView) -> Vec<&str> {
        view.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn empty_term_returns_same_view() {
        let all = view(&["Sara", "Ali"]);
        let filtered = apply(&all, "");
        assert!(Arc::ptr_eq(&all, &filtered));
    }

    #[test]
    fn match_ignores_case() {
        let all = view(&["Sara", "Ali", "ISSA"]);
        assert_eq!(names(&apply(&all, "sa")), vec!["Sara", "ISSA"]);
        assert_eq!(names(&apply(&all, "ALI")), vec!["Ali"]);
    }

    #[test]
    fn unicode_names_match() {
        let all = view(&["سارة", "Ωmega", "Émile"]);
        assert_eq!(names(&apply(&all, "سا")), vec!["سارة"]);
        assert_eq!(names(&apply(&all, "ωME")), vec!["Ωmega"]);
        assert_eq!(names(&apply(&all, "émi")), vec!["Émile"]);
    }

    #[test]
    fn nameless_records_never_match() {
        let all = view(&["", "Ali"]);
        assert_eq!(names(&apply(&all, "a")), vec!["Ali"]);
        assert_eq!(apply(&all, "").len(), 2);
    }

    #[test]
    fn repeated_calls_agree() {
        let all = view(&["Mona", "Ali", "Amr"]);
        assert_eq!(apply(&all, "a"), apply(&all, "a"));
        assert_eq!(names(&apply(&all, "zz")), Vec::<&str>::new());
    }
}
