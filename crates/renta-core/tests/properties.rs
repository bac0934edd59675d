use proptest::prelude::*;
use renta_core::progress::{percent_complete, TOTAL_EXPECTED_FIELDS};
use renta_core::{
    merge, render, snapshot, Extractor, ExtractionCandidate, Field, FormRecord, Instruction,
};

fn any_field() -> impl Strategy<Value = Field> {
    let fields: Vec<Field> = Field::all().collect();
    prop::sample::select(fields)
}

fn any_candidate() -> impl Strategy<Value = ExtractionCandidate> {
    (any_field(), "[A-Za-z0-9 ,]{1,20}")
        .prop_filter("blank values unset fields", |(_, v)| !v.trim().is_empty())
        .prop_map(|(field, value)| ExtractionCandidate::new(field, value))
}

fn any_record() -> impl Strategy<Value = FormRecord> {
    prop::collection::vec(any_candidate(), 0..20).prop_map(|c| merge(&FormRecord::new(), &c))
}

proptest! {
    #[test]
    fn merge_leaves_current_untouched(
        current in any_record(),
        candidates in prop::collection::vec(any_candidate(), 0..10),
    ) {
        let before = current.clone();
        let _ = merge(&current, &candidates);
        prop_assert_eq!(current, before);
    }

    #[test]
    fn merge_with_no_candidates_is_identity(current in any_record()) {
        prop_assert_eq!(merge(&current, &[]), current);
    }

    #[test]
    fn merge_keeps_last_candidate_per_field(
        current in any_record(),
        candidates in prop::collection::vec(any_candidate(), 1..10),
    ) {
        let merged = merge(&current, &candidates);
        for field in Field::all() {
            let expected = candidates
                .iter()
                .rev()
                .find(|c| c.field == field)
                .map(|c| c.value.as_str())
                .or_else(|| current.get(field));
            prop_assert_eq!(merged.get(field), expected);
        }
    }

    #[test]
    fn percent_is_monotonic_and_bounded(n in 0usize..64) {
        let p = percent_complete(n);
        prop_assert!(p <= 100);
        prop_assert!(percent_complete(n + 1) >= p);
        if n >= TOTAL_EXPECTED_FIELDS {
            prop_assert_eq!(p, 100);
        }
    }

    #[test]
    fn snapshot_counts_set_fields(record in any_record()) {
        prop_assert_eq!(snapshot(&record).percent_complete, percent_complete(record.len()));
    }

    #[test]
    fn render_is_deterministic(record in any_record()) {
        prop_assert_eq!(render(&record), render(&record));
    }

    #[test]
    fn render_stays_inside_page(record in any_record()) {
        let rendered = render(&record);
        for instruction in &rendered.instructions {
            if let Instruction::Text { y, .. } = instruction {
                prop_assert!(*y >= 50);
            }
        }
        prop_assert_eq!(rendered.lines().count(), 4 + record.len());
    }

    #[test]
    fn extraction_never_panics(user in ".{0,80}", assistant in ".{0,80}") {
        let candidates = Extractor::standard().extract(&user, &assistant);
        prop_assert!(candidates.len() <= 3);
    }
}
