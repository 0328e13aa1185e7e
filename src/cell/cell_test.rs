// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! Tests for the cell tagging scheme.

use super::{Cell, Tag};
use crate::types::Addr;

#[test]
fn reference_cell_roundtrips() {
    let cell = Cell::reference(Addr::new(42));
    assert_eq!(cell.tag(), Some(Tag::Ref));
    assert_eq!(cell.payload(), Addr::new(42));
}

#[test]
fn structure_cell_roundtrips() {
    let cell = Cell::structure(Addr::new(99));
    assert_eq!(cell.tag(), Some(Tag::Str));
    assert_eq!(cell.payload(), Addr::new(99));
}

#[test]
fn free_var_points_to_self() {
    let at = Addr::new(7);
    let cell = Cell::free_var(at);
    assert_eq!(cell.tag(), Some(Tag::Ref));
    assert_eq!(cell.payload(), at);
}

#[test]
fn functor_word_packs_id_and_arity() {
    let f = Cell::functor(0xABCD, 3);
    assert_eq!(f.functor_id(), 0xABCD);
    assert_eq!(f.functor_arity(), 3);
}

#[test]
fn functor_words_compare_by_raw_word() {
    let a = Cell::functor(1, 2);
    let b = Cell::functor(1, 2);
    let c = Cell::functor(1, 3);
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn zeroed_cell_has_no_tag() {
    let cell = Cell::zeroed();
    assert_eq!(cell.tag(), None);
    assert_eq!(cell.raw(), 0);
}

#[test]
fn tag_from_u8_rejects_unknown_values() {
    assert_eq!(Tag::from_u8(0), None);
    assert_eq!(Tag::from_u8(1), Some(Tag::Ref));
    assert_eq!(Tag::from_u8(2), Some(Tag::Str));
    assert_eq!(Tag::from_u8(3), None);
}

#[test]
fn debug_format() {
    assert_eq!(
        format!("{:?}", Cell::reference(Addr::new(5))),
        "Ref(Addr(0x5))"
    );
    assert_eq!(
        format!("{:?}", Cell::structure(Addr::new(6))),
        "Str(Addr(0x6))"
    );
}
