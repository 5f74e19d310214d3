//! Natural (numeric-aware) string ordering.
//!
//! Runs of ASCII digits compare by numeric value, everything else compares
//! byte-wise. Equal numbers with different zero padding order the shorter
//! spelling first so the ordering stays total.

use std::cmp::Ordering;

/// Compare two strings in natural order, e.g. `"Vol 2" < "Vol 10"`.
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let (start_a, start_b) = (i, j);
            while i < a.len() && a[i].is_ascii_digit() {
                i += 1;
            }
            while j < b.len() && b[j].is_ascii_digit() {
                j += 1;
            }
            let (run_a, run_b) = (&a[start_a..i], &b[start_b..j]);
            let (num_a, num_b) = (trim_zeros(run_a), trim_zeros(run_b));
            let ord = num_a
                .len()
                .cmp(&num_b.len())
                .then_with(|| num_a.cmp(num_b))
                .then_with(|| run_a.len().cmp(&run_b.len()));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            if a[i] != b[j] {
                return a[i].cmp(&b[j]);
            }
            i += 1;
            j += 1;
        }
    }

    (a.len() - i).cmp(&(b.len() - j))
}

fn trim_zeros(digits: &[u8]) -> &[u8] {
    let first = digits
        .iter()
        .position(|&d| d != b'0')
        .unwrap_or(digits.len());
    &digits[first..]
}
