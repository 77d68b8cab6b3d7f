//! Property checks for the visibility predicate and its declarative filter.

use std::collections::BTreeSet;

use chrono::Utc;
use docwell_core::UserId;
use docwell_domain::{
    AccessLevel, Capability, CapabilitySet, Document, DocumentInput, DocumentStatus,
    TransitionEffects, ViewerContext, VisibilityFilter, can_view,
};
use proptest::prelude::*;
use uuid::Uuid;

const GROUP_POOL: &[&str] = &["finance", "legal", "engineering", "people"];

fn user_id(seed: u128) -> UserId {
    UserId::from_uuid(Uuid::from_u128(seed))
}

fn build_document(
    owner_seed: u128,
    status: DocumentStatus,
    is_public: bool,
    groups: Vec<String>,
) -> Document {
    let created = Document::create(DocumentInput {
        title: "Generated".to_owned(),
        owner_id: user_id(owner_seed),
        is_public,
        access_groups: groups,
        created_at: Utc::now(),
    });

    let mut document = match created {
        Ok(document) => document,
        Err(error) => panic!("document construction failed: {error}"),
    };

    if status != DocumentStatus::Draft {
        let mut effects = TransitionEffects::for_target(status, document.owner_id(), Utc::now());
        // Keep the generated public flag authoritative for the test.
        effects.stamp_publication = false;
        document.apply_effects(&effects);
    }

    document
}

fn status_strategy() -> impl Strategy<Value = DocumentStatus> {
    prop::sample::select(DocumentStatus::all().to_vec())
}

fn groups_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(GROUP_POOL.to_vec(), 0..=GROUP_POOL.len())
        .prop_map(|groups| groups.into_iter().map(str::to_owned).collect())
}

fn capabilities_strategy() -> impl Strategy<Value = Vec<Capability>> {
    prop::sample::subsequence(Capability::all().to_vec(), 0..=Capability::all().len())
}

fn viewer_strategy() -> impl Strategy<Value = (u128, u8, Vec<Capability>, Vec<String>)> {
    (
        0u128..4,
        0u8..=100,
        capabilities_strategy(),
        groups_strategy(),
    )
}

fn document_strategy() -> impl Strategy<Value = (u128, DocumentStatus, bool, Vec<String>)> {
    (0u128..4, status_strategy(), any::<bool>(), groups_strategy())
}

fn make_viewer(seed: u128, level: u8, capabilities: &[Capability], groups: &[String]) -> ViewerContext {
    ViewerContext::from_parts(
        user_id(seed),
        AccessLevel::new(level).unwrap_or(AccessLevel::NONE),
        CapabilitySet::from_iter(capabilities.iter().copied()),
        groups.iter().cloned().collect::<BTreeSet<String>>(),
    )
}

proptest! {
    /// The declarative filter reproduces the row-by-row predicate exactly.
    #[test]
    fn filter_is_equivalent_to_predicate(
        (viewer_seed, level, capabilities, viewer_groups) in viewer_strategy(),
        (owner_seed, status, is_public, document_groups) in document_strategy(),
    ) {
        let viewer = make_viewer(viewer_seed, level, &capabilities, &viewer_groups);
        let document = build_document(owner_seed, status, is_public, document_groups);

        let filter = VisibilityFilter::for_viewer(&viewer);
        prop_assert_eq!(can_view(&viewer, &document), filter.matches(&document));
    }

    /// Raising a viewer's level never hides a previously visible document.
    #[test]
    fn visibility_is_monotone_in_level(
        (viewer_seed, level, capabilities, viewer_groups) in viewer_strategy(),
        raise in 0u8..=100,
        (owner_seed, status, is_public, document_groups) in document_strategy(),
    ) {
        let raised_level = level.saturating_add(raise).min(100);
        let viewer = make_viewer(viewer_seed, level, &capabilities, &viewer_groups);
        let raised = make_viewer(viewer_seed, raised_level, &capabilities, &viewer_groups);
        let document = build_document(owner_seed, status, is_public, document_groups);

        if can_view(&viewer, &document) {
            prop_assert!(can_view(&raised, &document));
        }
    }
}
