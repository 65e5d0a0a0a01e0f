//! Small slice helpers.

pub fn first_and_rest<T>(items: &[T]) -> Option<(&T, &[T])> {
    if items.len() > 0 {
        Some((&items[0], &items[1..]))
    } else {
        None
    }
}

/// Whether one of the two slices is a prefix of the other (equal
/// slices included).
pub fn is_prefix_related<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}
