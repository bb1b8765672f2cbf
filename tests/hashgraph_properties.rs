//! Hashgraph property tests: scenario-based verification of the insertion
//! pipeline, the coordinate vectors, and the predicate/round engines.
//!
//! These tests exercise the public API of the consensus module. Most build
//! a four-participant graph (super-majority 3) event by event and check
//! the invariants the ordering pass will rely on:
//! - **Coordinates**: self-slot stamping, last-ancestor inheritance,
//!   first-descendant back-propagation
//! - **Predicates**: ancestor/self-ancestor/see agreement, strongly-see
//!   through a supermajority of participants
//! - **Rounds**: witness classification, increment on strongly-seeing a
//!   supermajority of the previous round's witnesses
//! - **Pipeline**: rejection semantics, topological monotonicity, wire
//!   round-trips

use std::sync::Arc;

use tokio::sync::mpsc;

use weft::consensus::event::{Event, EventBody, EventId};
use weft::consensus::hashgraph::{Hashgraph, HashgraphError};
use weft::consensus::peers::Participants;
use weft::consensus::round::RoundInfo;
use weft::crypto::keys::SigningKeypair;
use weft::store::{InmemStore, Store};

// ── Helpers ─────────────────────────────────────────────────────────────

/// Build an n-participant graph over an in-memory store.
fn fixture(n: usize) -> (Vec<SigningKeypair>, Hashgraph<InmemStore>) {
    let keypairs: Vec<_> = (0..n).map(|_| SigningKeypair::generate()).collect();
    let participants = Arc::new(
        Participants::from_keys(keypairs.iter().map(|kp| kp.public.clone()).collect()).unwrap(),
    );
    let store = InmemStore::new(participants.clone(), 1000);
    let (commit_tx, _commit_rx) = mpsc::unbounded_channel();
    (keypairs, Hashgraph::new(participants, store, commit_tx))
}

fn make_event(
    keypair: &SigningKeypair,
    self_parent: EventId,
    other_parent: Option<EventId>,
    index: i64,
) -> Event {
    Event::new(
        EventBody {
            transactions: vec![],
            self_parent,
            other_parent,
            creator: keypair.public.clone(),
            timestamp: 1_700_000_000_000 + index as u64,
            index,
        },
        keypair,
    )
    .unwrap()
}

/// The first event of a creator, sitting directly on its root.
fn first_event(graph: &Hashgraph<InmemStore>, keypair: &SigningKeypair) -> Event {
    let root = graph
        .store()
        .get_root(&keypair.public.fingerprint())
        .unwrap()
        .unwrap();
    make_event(keypair, root.x, Some(root.y), 0)
}

/// Insert every creator's first event and record them as round-0 witnesses
/// (the round records the downstream pass would normally write).
fn bootstrap(
    graph: &mut Hashgraph<InmemStore>,
    keypairs: &[SigningKeypair],
) -> Vec<Event> {
    let mut firsts = Vec::new();
    for keypair in keypairs {
        let event = first_event(graph, keypair);
        graph.insert_event(event.clone(), true).unwrap();
        firsts.push(event);
    }
    let mut round0 = RoundInfo::default();
    for event in &firsts {
        round0.add_event(event.id, true);
    }
    graph.store().set_round(0, &round0).unwrap();
    firsts
}

fn stored(graph: &Hashgraph<InmemStore>, id: &EventId) -> Event {
    graph.store().get_event(id).unwrap().unwrap()
}

// ── Scenario: empty graph ───────────────────────────────────────────────

#[test]
fn empty_graph_has_no_rounds() {
    let (keypairs, mut graph) = fixture(4);
    assert_eq!(graph.round(&EventId([1u8; 32])), -1);

    // The first event of a creator succeeds and becomes a witness of
    // round root.round + 1.
    let root = graph
        .store()
        .get_root(&keypairs[0].public.fingerprint())
        .unwrap()
        .unwrap();
    let a0 = first_event(&graph, &keypairs[0]);
    graph.insert_event(a0.clone(), false).unwrap();
    assert_eq!(graph.round(&a0.id), root.round + 1);
    assert!(graph.witness(&a0.id));
}

// ── Scenario: rejection semantics ───────────────────────────────────────

#[test]
fn self_parent_mismatch_leaves_state_untouched() {
    let (keypairs, mut graph) = fixture(4);
    let a0 = first_event(&graph, &keypairs[0]);
    graph.insert_event(a0.clone(), false).unwrap();

    // A competing event that also claims to sit on the root.
    let root = graph
        .store()
        .get_root(&keypairs[0].public.fingerprint())
        .unwrap()
        .unwrap();
    let competing = make_event(&keypairs[0], root.x, None, 0);
    assert!(matches!(
        graph.insert_event(competing, false),
        Err(HashgraphError::SelfParentMismatch)
    ));

    let fingerprint = keypairs[0].public.fingerprint();
    assert_eq!(graph.store().last_from(&fingerprint).unwrap(), (a0.id, false));
    assert_eq!(graph.undetermined_events(), &[a0.id]);
}

#[test]
fn reinserting_an_event_is_rejected() {
    let (keypairs, mut graph) = fixture(4);
    let a0 = first_event(&graph, &keypairs[0]);
    graph.insert_event(a0.clone(), false).unwrap();
    assert!(matches!(
        graph.insert_event(a0, false),
        Err(HashgraphError::SelfParentMismatch)
    ));
}

// ── Scenario: ancestry through the other-parent ─────────────────────────

#[test]
fn ancestor_via_other_parent() {
    let (keypairs, mut graph) = fixture(4);
    let a0 = first_event(&graph, &keypairs[0]);
    let b0 = first_event(&graph, &keypairs[1]);
    graph.insert_event(a0.clone(), false).unwrap();
    graph.insert_event(b0.clone(), false).unwrap();

    let a1 = make_event(&keypairs[0], a0.id, Some(b0.id), 1);
    graph.insert_event(a1.clone(), false).unwrap();

    assert!(graph.ancestor(&a1.id, &b0.id));
    assert!(graph.ancestor(&a1.id, &a0.id));
    assert!(graph.see(&a1.id, &b0.id));
    assert!(graph.self_ancestor(&a1.id, &a0.id));
    assert!(!graph.self_ancestor(&a1.id, &b0.id));
    assert!(!graph.ancestor(&b0.id, &a1.id));
}

#[test]
fn first_descendant_back_propagation() {
    let (keypairs, mut graph) = fixture(4);
    let a0 = first_event(&graph, &keypairs[0]);
    let b0 = first_event(&graph, &keypairs[1]);
    graph.insert_event(a0.clone(), false).unwrap();
    graph.insert_event(b0.clone(), false).unwrap();
    let a1 = make_event(&keypairs[0], a0.id, Some(b0.id), 1);
    graph.insert_event(a1.clone(), false).unwrap();

    let id_a = graph.participants().id_of(&keypairs[0].public).unwrap();
    let id_b = graph.participants().id_of(&keypairs[1].public).unwrap();

    // B0 learned its first descendant from A via back-propagation; the
    // creators' own slots keep the events themselves.
    let b0_stored = stored(&graph, &b0.id);
    assert_eq!(b0_stored.first_descendants.get(id_a).unwrap().index, 1);
    assert_eq!(b0_stored.first_descendants.get(id_a).unwrap().id, a1.id);
    assert_eq!(b0_stored.first_descendants.get(id_b).unwrap().index, 0);
    assert_eq!(b0_stored.first_descendants.get(id_b).unwrap().id, b0.id);

    let a0_stored = stored(&graph, &a0.id);
    assert_eq!(a0_stored.first_descendants.get(id_a).unwrap().index, 0);
    assert_eq!(a0_stored.first_descendants.get(id_a).unwrap().id, a0.id);
}

#[test]
fn oldest_self_ancestor_to_see_returns_earliest_seer() {
    let (keypairs, mut graph) = fixture(4);
    let a0 = first_event(&graph, &keypairs[0]);
    let b0 = first_event(&graph, &keypairs[1]);
    graph.insert_event(a0.clone(), false).unwrap();
    graph.insert_event(b0.clone(), false).unwrap();
    let a1 = make_event(&keypairs[0], a0.id, Some(b0.id), 1);
    let a2 = make_event(&keypairs[0], a1.id, None, 2);
    graph.insert_event(a1.clone(), false).unwrap();
    graph.insert_event(a2.clone(), false).unwrap();

    // A1 is the earliest A-event seeing B0; A0 does not see it at all.
    assert_eq!(graph.oldest_self_ancestor_to_see(&a2.id, &b0.id), Some(a1.id));
    assert_eq!(graph.oldest_self_ancestor_to_see(&a1.id, &b0.id), Some(a1.id));
    assert_eq!(graph.oldest_self_ancestor_to_see(&a0.id, &b0.id), None);
}

// ── Scenario: rounds and witnesses ──────────────────────────────────────

/// Gossip pattern: B1 hears A0, C1 hears B1, D1 hears C1, A1 hears D1.
/// A1 then strongly-sees three of the four round-0 witnesses (A0, B0, C0)
/// and increments to round 1; D1 strongly-sees only two and stays in
/// round 0.
#[test]
fn round_increments_on_supermajority_of_strongly_seen_witnesses() {
    let (keypairs, mut graph) = fixture(4);
    let firsts = bootstrap(&mut graph, &keypairs);
    let (a0, b0, c0, d0) = (&firsts[0], &firsts[1], &firsts[2], &firsts[3]);

    let b1 = make_event(&keypairs[1], b0.id, Some(a0.id), 1);
    graph.insert_event(b1.clone(), false).unwrap();
    let c1 = make_event(&keypairs[2], c0.id, Some(b1.id), 1);
    graph.insert_event(c1.clone(), false).unwrap();
    let d1 = make_event(&keypairs[3], d0.id, Some(c1.id), 1);
    graph.insert_event(d1.clone(), false).unwrap();
    let a1 = make_event(&keypairs[0], a0.id, Some(d1.id), 1);
    graph.insert_event(a1.clone(), false).unwrap();

    for event in &firsts {
        assert_eq!(graph.round(&event.id), 0);
        assert!(graph.witness(&event.id));
    }

    let seen: Vec<bool> = firsts
        .iter()
        .map(|witness| graph.strongly_see(&a1.id, &witness.id))
        .collect();
    assert_eq!(seen, vec![true, true, true, false]);

    assert!(graph.round_inc(&a1.id));
    assert_eq!(graph.round(&a1.id), 1);
    assert!(graph.witness(&a1.id));

    // D1 reaches only two witnesses: no increment.
    assert!(!graph.round_inc(&d1.id));
    assert_eq!(graph.round(&d1.id), 0);
    assert!(!graph.witness(&d1.id));

    // B1 and C1 stay in round 0 as well.
    assert_eq!(graph.round(&b1.id), 0);
    assert_eq!(graph.round(&c1.id), 0);
    assert!(!graph.witness(&b1.id));
}

#[test]
fn round_is_parent_round_or_one_above() {
    let (keypairs, mut graph) = fixture(4);
    let firsts = bootstrap(&mut graph, &keypairs);
    let b1 = make_event(&keypairs[1], firsts[1].id, Some(firsts[0].id), 1);
    graph.insert_event(b1.clone(), false).unwrap();

    for id in graph.undetermined_events().to_vec() {
        let parent_round = graph.parent_round(&id);
        let round = graph.round(&id);
        assert!(round == parent_round.round || round == parent_round.round + 1);
    }
}

#[test]
fn round_diff_and_unresolved_rounds() {
    let (keypairs, mut graph) = fixture(4);
    let firsts = bootstrap(&mut graph, &keypairs);
    let b1 = make_event(&keypairs[1], firsts[1].id, Some(firsts[0].id), 1);
    graph.insert_event(b1.clone(), false).unwrap();

    assert_eq!(graph.round_diff(&b1.id, &firsts[0].id).unwrap(), 0);
    assert!(matches!(
        graph.round_diff(&b1.id, &EventId([9u8; 32])),
        Err(HashgraphError::NegativeRound(_))
    ));
}

// ── Quantified invariants ───────────────────────────────────────────────

#[test]
fn self_coordinates_stamped_for_every_event() {
    let (keypairs, mut graph) = fixture(4);
    let firsts = bootstrap(&mut graph, &keypairs);
    let b1 = make_event(&keypairs[1], firsts[1].id, Some(firsts[0].id), 1);
    let c1 = make_event(&keypairs[2], firsts[2].id, Some(b1.id), 1);
    graph.insert_event(b1, false).unwrap();
    graph.insert_event(c1, false).unwrap();

    for id in graph.undetermined_events().to_vec() {
        let event = stored(&graph, &id);
        let creator_id = graph.participants().id_of(&event.body.creator).unwrap();
        let last = event.last_ancestors.get(creator_id).unwrap();
        let first = event.first_descendants.get(creator_id).unwrap();
        assert_eq!((last.index, last.id), (event.body.index, id));
        assert_eq!((first.index, first.id), (event.body.index, id));
    }
}

#[test]
fn topological_indices_strictly_increase() {
    let (keypairs, mut graph) = fixture(4);
    let firsts = bootstrap(&mut graph, &keypairs);
    let b1 = make_event(&keypairs[1], firsts[1].id, Some(firsts[0].id), 1);
    graph.insert_event(b1, false).unwrap();

    let indices: Vec<i64> = graph
        .undetermined_events()
        .iter()
        .map(|id| stored(&graph, id).topological_index)
        .collect();
    assert_eq!(indices, (0..indices.len() as i64).collect::<Vec<_>>());
}

#[test]
fn per_creator_indices_are_contiguous() {
    let (keypairs, mut graph) = fixture(4);
    let firsts = bootstrap(&mut graph, &keypairs);
    let b1 = make_event(&keypairs[1], firsts[1].id, Some(firsts[0].id), 1);
    let b2 = make_event(&keypairs[1], b1.id, None, 2);
    graph.insert_event(b1, false).unwrap();
    graph.insert_event(b2, false).unwrap();

    let fingerprint = keypairs[1].public.fingerprint();
    for index in 0..3 {
        let id = graph
            .store()
            .participant_event(&fingerprint, index)
            .unwrap()
            .unwrap();
        assert_eq!(stored(&graph, &id).body.index, index);
    }
    assert_eq!(graph.store().known().unwrap()[&1], 2);
}

// ── Wire round-trips ────────────────────────────────────────────────────

#[test]
fn wire_roundtrip_preserves_parents() {
    let (keypairs, mut graph) = fixture(4);
    let a0 = first_event(&graph, &keypairs[0]);
    let b0 = first_event(&graph, &keypairs[1]);
    graph.insert_event(a0.clone(), true).unwrap();
    graph.insert_event(b0.clone(), true).unwrap();
    let a1 = make_event(&keypairs[0], a0.id, Some(b0.id), 1);
    graph.insert_event(a1.clone(), true).unwrap();

    let wire = stored(&graph, &a1.id).to_wire().unwrap();
    let decoded = graph.read_wire_info(&wire).unwrap();
    assert_eq!(decoded.body.self_parent, a0.id);
    assert_eq!(decoded.body.other_parent, Some(b0.id));
    assert_eq!(decoded.id, a1.id);
    assert!(decoded.verify());
}

#[test]
fn wire_roundtrip_first_event_resolves_root_parents() {
    let (keypairs, mut graph) = fixture(4);
    let a0 = first_event(&graph, &keypairs[0]);
    graph.insert_event(a0.clone(), true).unwrap();

    let wire = stored(&graph, &a0.id).to_wire().unwrap();
    assert_eq!(wire.body.self_parent_index, -1);
    assert_eq!(wire.body.other_parent_index, -1);

    // Index -1 decodes to the creator's root self-parent and no other-parent.
    let decoded = graph.read_wire_info(&wire).unwrap();
    let root = graph
        .store()
        .get_root(&keypairs[0].public.fingerprint())
        .unwrap()
        .unwrap();
    assert_eq!(decoded.body.self_parent, root.x);
    assert_eq!(decoded.body.other_parent, None);
}

// ── Cache transparency ──────────────────────────────────────────────────

#[test]
fn repeated_queries_agree_with_first_computation() {
    let (keypairs, mut graph) = fixture(4);
    let firsts = bootstrap(&mut graph, &keypairs);
    let b1 = make_event(&keypairs[1], firsts[1].id, Some(firsts[0].id), 1);
    graph.insert_event(b1.clone(), false).unwrap();

    for _ in 0..2 {
        assert!(graph.ancestor(&b1.id, &firsts[0].id));
        assert!(graph.self_ancestor(&b1.id, &firsts[1].id));
        assert!(!graph.strongly_see(&b1.id, &firsts[3].id));
        assert_eq!(graph.round(&b1.id), 0);
        assert_eq!(graph.parent_round(&b1.id).round, 0);
    }
}

// ── Degenerate participant sets ─────────────────────────────────────────

#[test]
fn single_participant_strongly_see_equals_ancestor() {
    let (keypairs, mut graph) = fixture(1);
    let a0 = first_event(&graph, &keypairs[0]);
    let a1 = make_event(&keypairs[0], a0.id, None, 1);
    graph.insert_event(a0.clone(), false).unwrap();
    graph.insert_event(a1.clone(), false).unwrap();

    assert_eq!(graph.participants().super_majority(), 1);
    for (x, y) in [(&a1, &a0), (&a0, &a1), (&a1, &a1)] {
        assert_eq!(
            graph.strongly_see(&x.id, &y.id),
            graph.ancestor(&x.id, &y.id)
        );
    }
}
