//! Display order of records that carry an optional order key

use std::cmp::Ordering;

/// Entities that take part in a user-reorderable list
pub trait SortableEntity {
    fn id(&self) -> &str;

    /// `None` means the entity has not been given a position yet
    fn sort_key(&self) -> Option<&str>;
}

/// Key ascending, unkeyed entities last, equal keys broken by id.
///
/// Two records can end up with the same key when two moves into the same gap
/// race; the id tiebreak keeps the rendered order deterministic until a later
/// move separates them.
pub fn compare_entities<T: SortableEntity>(a: &T, b: &T) -> Ordering {
    match (a.sort_key(), b.sort_key()) {
        (Some(ka), Some(kb)) => ka.cmp(kb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.id().cmp(b.id()))
}

pub fn sort_entities<T: SortableEntity>(items: &mut [T]) {
    items.sort_by(compare_entities);
}
