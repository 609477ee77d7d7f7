use std::collections::{HashMap, HashSet};

use crate::request::ValueCandidate;

/// Make display labels unique.
///
/// Candidates are ordered by label (ties keep input order). A label shared by
/// several identifiers gets ` (<identifier>)` appended. If that still leaves a
/// clash, every label gets the suffix, and any leftover duplicate is numbered.
/// Candidates without a label use their identifier.
pub fn disambiguate_labels(candidates: Vec<ValueCandidate>) -> Vec<ValueCandidate> {
    let mut entries = candidates
        .into_iter()
        .map(|candidate| {
            let label = candidate
                .label
                .clone()
                .unwrap_or_else(|| candidate.value.clone());
            (candidate.value, label)
        })
        .collect::<Vec<_>>();
    entries.sort_by(|left, right| left.1.cmp(&right.1));

    if !has_duplicates(entries.iter().map(|(_, label)| label.as_str())) {
        return into_candidates(entries);
    }

    let fixed = suffix_colliding(&entries);
    if !has_duplicates(fixed.iter().map(|(_, label)| label.as_str())) {
        return into_candidates(fixed);
    }

    let mut all_suffixed = entries
        .into_iter()
        .map(|(value, label)| {
            let label = format!("{label} ({value})");
            (value, label)
        })
        .collect::<Vec<_>>();
    number_leftovers(&mut all_suffixed);
    into_candidates(all_suffixed)
}

fn suffix_colliding(entries: &[(String, String)]) -> Vec<(String, String)> {
    let mut counts = HashMap::<&str, usize>::new();
    for (_, label) in entries {
        *counts.entry(label.as_str()).or_insert(0) += 1;
    }
    entries
        .iter()
        .map(|(value, label)| {
            if counts.get(label.as_str()).copied().unwrap_or(0) > 1 {
                (value.clone(), format!("{label} ({value})"))
            } else {
                (value.clone(), label.clone())
            }
        })
        .collect()
}

fn has_duplicates<'a>(labels: impl Iterator<Item = &'a str>) -> bool {
    let mut seen = HashSet::new();
    for label in labels {
        if !seen.insert(label) {
            return true;
        }
    }
    false
}

fn number_leftovers(entries: &mut [(String, String)]) {
    let mut seen = HashSet::new();
    for (_, label) in entries.iter_mut() {
        if seen.insert(label.clone()) {
            continue;
        }
        let mut counter = 2usize;
        loop {
            let candidate = format!("{label} [{counter}]");
            if seen.insert(candidate.clone()) {
                *label = candidate;
                break;
            }
            counter += 1;
        }
    }
}

fn into_candidates(entries: Vec<(String, String)>) -> Vec<ValueCandidate> {
    entries
        .into_iter()
        .map(|(value, label)| ValueCandidate::labeled(value, label))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::disambiguate_labels;
    use crate::request::ValueCandidate;

    fn labels(candidates: &[ValueCandidate]) -> Vec<String> {
        candidates
            .iter()
            .map(|candidate| candidate.label.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn distinct_labels_are_only_sorted() {
        let output = disambiguate_labels(vec![
            ValueCandidate::labeled("Q2", "Zebra"),
            ValueCandidate::labeled("Q1", "Aardvark"),
        ]);
        assert_eq!(labels(&output), vec!["Aardvark", "Zebra"]);
        assert_eq!(output[0].value, "Q1");
    }

    #[test]
    fn colliding_labels_get_identifier_suffix() {
        let output = disambiguate_labels(vec![
            ValueCandidate::labeled("Paris (France)", "Paris"),
            ValueCandidate::labeled("Paris, Texas", "Paris"),
            ValueCandidate::labeled("Lyon", "Lyon"),
        ]);
        assert_eq!(
            labels(&output),
            vec![
                "Lyon",
                "Paris (Paris (France))",
                "Paris (Paris, Texas)",
            ]
        );
    }

    #[test]
    fn second_round_suffixes_everything() {
        // "A (y)" already exists as a label, so suffixing only the "A" pair clashes.
        let output = disambiguate_labels(vec![
            ValueCandidate::labeled("x", "A"),
            ValueCandidate::labeled("y", "A"),
            ValueCandidate::labeled("z", "A (y)"),
        ]);
        let unique = labels(&output).into_iter().collect::<HashSet<_>>();
        assert_eq!(unique.len(), 3);
        assert!(unique.contains("A (y) (z)"));
    }

    #[test]
    fn missing_labels_fall_back_to_identifier() {
        let output = disambiguate_labels(vec![
            ValueCandidate::plain("Plain page"),
            ValueCandidate::labeled("Other", "Plain page"),
        ]);
        let unique = labels(&output).into_iter().collect::<HashSet<_>>();
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn output_is_deterministic() {
        let input = vec![
            ValueCandidate::labeled("b", "Same"),
            ValueCandidate::labeled("a", "Same"),
        ];
        assert_eq!(disambiguate_labels(input.clone()), disambiguate_labels(input));
    }
}
