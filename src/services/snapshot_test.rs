use super::*;

fn tracker() -> ChangeSnapshotTracker {
    ChangeSnapshotTracker::default()
}

// =========================================================================
// normalization
// =========================================================================

#[test]
fn markup_normalization_ignores_formatting_and_case() {
    let a = "<DIV class=\"hero\">\n    <H1>Hello</H1>\n</DIV>";
    let b = "<div class=\"hero\"><h1>Hello</h1></div>";
    assert_eq!(normalize_markup(a), normalize_markup(b));
    assert_eq!(normalize_markup(a), "<div class=\"hero\"><h1>hello</h1></div>");
}

#[test]
fn markup_normalization_keeps_text_spacing() {
    assert_eq!(normalize_markup("<p>two   words</p>"), "<p>two words</p>");
}

#[test]
fn style_normalization_strips_cosmetic_syntax() {
    let a = ".Hero {\n  color:   RED;\n  margin: 0;\n}\n";
    let b = ".hero{color:red; margin:0}";
    assert_eq!(normalize_style(a), normalize_style(b));
    assert_eq!(normalize_style(a), ".hero {color:red; margin:0}");
}

// =========================================================================
// diff_ratio
// =========================================================================

#[test]
fn diff_ratio_identical_is_zero() {
    assert!(diff_ratio("abc", "abc").abs() < f64::EPSILON);
    assert!(diff_ratio("", "").abs() < f64::EPSILON);
}

#[test]
fn diff_ratio_one_side_empty_is_one() {
    assert!((diff_ratio("", "abc") - 1.0).abs() < f64::EPSILON);
    assert!((diff_ratio("abc", "") - 1.0).abs() < f64::EPSILON);
}

#[test]
fn diff_ratio_counts_length_and_mismatches() {
    // 1 length difference + 1 mismatch at index 1, over max length 4.
    assert!((diff_ratio("abcd", "axc") - 0.5).abs() < f64::EPSILON);
}

#[test]
fn diff_ratio_stays_in_unit_interval() {
    for (a, b) in [("a", "bbbbbbbb"), ("héllo", "hello"), ("xyz", "zyx"), ("short", "a much longer string")] {
        let r = diff_ratio(a, b);
        assert!((0.0..=1.0).contains(&r), "{a:?} vs {b:?} gave {r}");
    }
}

#[test]
fn diff_ratio_counts_characters_not_bytes() {
    // One mismatching character out of five, although the bytes differ in length.
    assert!((diff_ratio("héllo", "hello") - 0.2).abs() < f64::EPSILON);
}

// =========================================================================
// is_significant
// =========================================================================

#[test]
fn first_snapshot_is_always_significant() {
    let s = tracker().snapshot("<p>a</p>", "", 1);
    assert!(tracker().is_significant(None, &s));
}

#[test]
fn identical_normalized_content_is_not_significant() {
    let t = tracker();
    let old = t.snapshot("<div>\n  <p>Hello</p>\n</div>", "p {\n color: red;\n}", 2);
    let new = t.snapshot("<DIV><P>Hello</P></DIV>", "p{color:red}", 2);
    assert_eq!(old.structural_hash, new.structural_hash);
    assert!(diff_ratio(&old.normalized_markup, &new.normalized_markup).abs() < f64::EPSILON);
    assert!(!t.is_significant(Some(&old), &new));
}

#[test]
fn element_count_change_is_significant_regardless_of_ratio() {
    let t = tracker();
    let old = t.snapshot("<p>a</p>", "", 3);
    let same_content = t.snapshot("<p>a</p>", "", 4);
    assert!(t.is_significant(Some(&old), &same_content));
}

#[test]
fn tiny_edit_below_threshold_is_not_significant() {
    let t = tracker();
    let body = "x".repeat(200);
    let old = t.snapshot(&format!("<p>{body}a</p>"), "", 1);
    let new = t.snapshot(&format!("<p>{body}b</p>"), "", 1);
    assert_ne!(old.structural_hash, new.structural_hash);
    assert!(!t.is_significant(Some(&old), &new));
}

#[test]
fn large_markup_edit_is_significant() {
    let t = tracker();
    let old = t.snapshot("<section><h1>Welcome</h1></section>", "", 1);
    let new = t.snapshot("<section><h2>Pricing plans</h2></section>", "", 1);
    assert!(t.is_significant(Some(&old), &new));
}

#[test]
fn style_only_edit_is_significant() {
    let t = tracker();
    let old = t.snapshot("<p>a</p>", "p{color:red}", 1);
    let new = t.snapshot("<p>a</p>", "p{color:blue;font-size:20px}", 1);
    assert!(t.is_significant(Some(&old), &new));
}

#[test]
fn threshold_is_configurable() {
    let strict = ChangeSnapshotTracker::new(0.0);
    let body = "x".repeat(200);
    let old = strict.snapshot(&format!("<p>{body}a</p>"), "", 1);
    let new = strict.snapshot(&format!("<p>{body}b</p>"), "", 1);
    assert!(strict.is_significant(Some(&old), &new));
}

#[test]
fn hash_is_deterministic() {
    let t = tracker();
    let a = t.snapshot("<p>same</p>", "p{}", 1);
    let b = t.snapshot("<p>same</p>", "p{}", 1);
    assert_eq!(a, b);
}
