// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! Tests for the fragment table.

use super::{Entry, Loader, LoaderError};

#[test]
fn register_and_look_up_an_interpreted_fragment() {
    let mut loader = Loader::new();
    loader.register_interpreted(0).unwrap();
    assert_eq!(loader.entry(0), Some(Entry::Interpreted(0)));
}

#[test]
fn registering_the_same_offset_twice_is_rejected() {
    let mut loader = Loader::new();
    loader.register_interpreted(10).unwrap();
    assert_eq!(
        loader.register_interpreted(10),
        Err(LoaderError::OverlappingFragment)
    );
}

#[test]
fn unknown_offset_has_no_entry() {
    let loader = Loader::new();
    assert_eq!(loader.entry(5), None);
}

#[test]
fn clear_discards_all_fragments() {
    let mut loader = Loader::new();
    loader.register_interpreted(0).unwrap();
    loader.clear();
    assert_eq!(loader.entry(0), None);
}

#[cfg(feature = "jit")]
#[test]
fn deferred_fragments_are_listed_by_span_until_marked_linked() {
    use super::LinkStatus;

    let mut loader = Loader::new();
    loader.register_compiled(0, 5, LinkStatus::Deferred).unwrap();
    loader.register_compiled(10, 1, LinkStatus::Linked).unwrap();

    assert_eq!(loader.deferred().collect::<Vec<_>>(), vec![0]);
    assert_eq!(loader.span(0), Some(5));

    loader.mark_linked(0);
    assert_eq!(loader.status(0), Some(LinkStatus::Linked));
    assert_eq!(loader.deferred().collect::<Vec<_>>(), Vec::<usize>::new());
}
