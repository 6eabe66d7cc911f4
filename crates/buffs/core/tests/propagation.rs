mod common;

use buffs_core::{
    BuffError, BuffId, BuffSpec, EntityId, ErrorSeverity, Operator, Trigger,
    get_propagation_source,
};
use common::{
    Attr, Game, GameEvent, GameEventKind, Kingdom, Kind, complete_building, engine_with, event,
};

const ROYAL: BuffId = BuffId(1);
const RALLY: BuffId = BuffId(2);
const BANNER: BuffId = BuffId(3);
const SHARP: BuffId = BuffId(4);
const VIGOR: BuffId = BuffId(5);
const PLATE: BuffId = BuffId(6);

fn royal() -> BuffSpec<Game> {
    BuffSpec::new(ROYAL)
        .modify(Operator::Add, 50.0, Attr::Def)
        .propagates_to([Kind::Player])
}

/// A castle with two players.
fn kingdom() -> (Kingdom, EntityId, EntityId, EntityId) {
    let mut world = Kingdom::default();
    let castle = world.castle();
    let first = world.player();
    let second = world.player();
    world.join(castle, first);
    world.join(castle, second);
    (world, castle, first, second)
}

// =============================================================================
// Fan-out and removal
// =============================================================================

#[test]
fn castle_buff_reaches_its_players() {
    let engine = engine_with([royal()]);
    let (mut world, castle, first, second) = kingdom();

    let result = engine
        .add_buff(&mut world, castle, ROYAL, &complete_building(castle))
        .expect("add should succeed");

    assert!(result.added.is_empty());
    assert_eq!(result.propagated.len(), 2);
    assert_eq!(result.propagated[&first][0].added.len(), 1);

    assert_eq!(world.value(castle, Attr::Def), 0.0);
    assert!(world.get(castle).has_buff(ROYAL));
    assert!(world.get(castle).propagation_triggers.is_empty());
    for player in [first, second] {
        let entity = world.get(player);
        assert_eq!(entity.attribute_value(Attr::Def), 50.0);
        assert_eq!(entity.received_from(ROYAL), Some(castle));
        assert!(entity.propagation_triggers.is_empty());
    }
}

#[test]
fn propagated_modifications_remember_their_source() {
    let engine = engine_with([royal()]);
    let (mut world, castle, first, _) = kingdom();

    let result = engine
        .add_buff(&mut world, castle, ROYAL, &complete_building(castle))
        .expect("add should succeed");

    let modification = &result.propagated[&first][0].added[0];
    assert_eq!(get_propagation_source(&modification.source_event), Some(castle));
    assert_eq!(modification.source_event.entity(), first);
    assert_eq!(modification.source_event.depth(), 4);
    assert_eq!(
        world.get(castle).active_buffs[&ROYAL].source_event.propagation_source(),
        None
    );
}

#[test]
fn removing_at_the_source_clears_every_target() {
    let engine = engine_with([royal()]);
    let (mut world, castle, first, second) = kingdom();
    engine
        .add_buff(&mut world, castle, ROYAL, &complete_building(castle))
        .expect("add should succeed");

    let result = engine
        .remove_buff(&mut world, castle, ROYAL)
        .expect("remove should succeed");
    assert_eq!(result.propagated.len(), 2);

    assert!(!world.get(castle).has_buff(ROYAL));
    for player in [first, second] {
        let entity = world.get(player);
        assert_eq!(entity.attribute_value(Attr::Def), 0.0);
        assert!(!entity.has_buff(ROYAL));
        assert_eq!(entity.received_from(ROYAL), None);
    }
}

#[test]
fn targets_cannot_remove_a_received_buff() {
    let engine = engine_with([royal()]);
    let (mut world, castle, first, _) = kingdom();
    engine
        .add_buff(&mut world, castle, ROYAL, &complete_building(castle))
        .expect("add should succeed");

    let err = engine
        .remove_buff(&mut world, first, ROYAL)
        .expect_err("only the castle may remove it");
    assert_eq!(
        err,
        BuffError::NotSourceOwner {
            entity: first,
            buff: ROYAL,
            owner: castle,
        }
    );
    assert_eq!(err.severity(), ErrorSeverity::Recoverable);
    assert_eq!(world.value(first, Attr::Def), 50.0);
}

#[test]
fn removal_reaches_players_who_left() {
    let engine = engine_with([royal()]);
    let (mut world, castle, first, second) = kingdom();
    engine
        .add_buff(&mut world, castle, ROYAL, &complete_building(castle))
        .expect("add should succeed");
    world.leave(castle, first);

    let result = engine
        .remove_buff(&mut world, castle, ROYAL)
        .expect("remove should succeed");
    assert_eq!(result.propagated.len(), 2);
    for player in [first, second] {
        let entity = world.get(player);
        assert_eq!(entity.attribute_value(Attr::Def), 0.0);
        assert!(!entity.has_buff(ROYAL));
        assert_eq!(entity.received_from(ROYAL), None);
    }
    assert!(world.get(castle).recipients(ROYAL).is_empty());
}

#[test]
fn failed_fan_out_rolls_back_every_entity() {
    let engine = engine_with([royal()]);
    let (mut world, castle, first, second) = kingdom();
    let ghost = EntityId(99);
    world.castle_players.insert(castle, vec![first, ghost, second]);

    let err = engine
        .add_buff(&mut world, castle, ROYAL, &complete_building(castle))
        .expect_err("the resolver names an entity that does not exist");
    assert_eq!(err, BuffError::EntityNotFound(ghost));

    let source = world.get(castle);
    assert!(!source.has_buff(ROYAL));
    assert!(source.activation_triggers.is_empty());
    assert!(source.propagation_triggers.is_empty());
    assert!(source.recipients(ROYAL).is_empty());
    for player in [first, second] {
        let entity = world.get(player);
        assert!(!entity.has_buff(ROYAL));
        assert_eq!(entity.received_from(ROYAL), None);
        assert_eq!(entity.attribute_value(Attr::Def), 0.0);
    }
}

// =============================================================================
// Propagation triggers and conditions
// =============================================================================

#[test]
fn propagation_waits_for_its_trigger_and_conditions() {
    let engine = engine_with([BuffSpec::new(RALLY)
        .modify(Operator::Add, 10.0, Attr::Atk)
        .propagates_to([Kind::Player])
        .propagates_when(GameEventKind::RecruitPlayer)
        .only_propagates_if("has_players 2")]);
    let mut world = Kingdom::default();
    let castle = world.castle();
    let first = world.player();
    world.join(castle, first);

    engine
        .add_buff(&mut world, castle, RALLY, &complete_building(castle))
        .expect("add should succeed");
    let recruit = Trigger::Event(GameEventKind::RecruitPlayer);
    assert!(world.get(castle).has_buff(RALLY));
    assert!(!world.get(castle).propagation_triggers.contains(&Trigger::OnAdd, RALLY));
    assert!(world.get(castle).propagation_triggers.contains(&recruit, RALLY));
    assert_eq!(world.value(first, Attr::Atk), 0.0);

    let recruited = event(castle, GameEvent::RecruitPlayer);
    engine
        .call_event(&mut world, &recruited)
        .expect("dispatch should succeed");
    assert_eq!(world.value(first, Attr::Atk), 0.0);

    let second = world.player();
    world.join(castle, second);
    let result = engine
        .call_event(&mut world, &recruited)
        .expect("dispatch should succeed");
    assert_eq!(result.propagated.len(), 2);
    assert_eq!(world.value(first, Attr::Atk), 10.0);
    assert_eq!(world.value(second, Attr::Atk), 10.0);

    // Explicit propagation triggers stay bound; a repeat is capped by max_stack.
    assert!(world.get(castle).propagation_triggers.contains(&recruit, RALLY));
    engine
        .call_event(&mut world, &recruited)
        .expect("dispatch should succeed");
    assert_eq!(world.value(first, Attr::Atk), 10.0);
}

// =============================================================================
// Stacks
// =============================================================================

#[test]
fn stacks_propagate_one_at_a_time() {
    let engine = engine_with([royal().stacks(3)]);
    let (mut world, castle, first, second) = kingdom();

    for _ in 0..3 {
        engine
            .add_buff(&mut world, castle, ROYAL, &complete_building(castle))
            .expect("add should succeed");
    }
    assert_eq!(world.get(castle).stack_of(ROYAL), 3);
    for player in [first, second] {
        assert_eq!(world.get(player).stack_of(ROYAL), 3);
        assert_eq!(world.value(player, Attr::Def), 150.0);
    }
}

#[test]
fn source_inactivation_fans_out_one_stack() {
    let engine = engine_with([royal().stacks(3)]);
    let (mut world, castle, first, second) = kingdom();
    for _ in 0..3 {
        engine
            .add_buff(&mut world, castle, ROYAL, &complete_building(castle))
            .expect("add should succeed");
    }

    let result = engine
        .inactivate_buff(&mut world, castle, ROYAL)
        .expect("inactivate should succeed");
    assert_eq!(result.propagated.len(), 2);
    assert_eq!(world.get(castle).stack_of(ROYAL), 2);
    for player in [first, second] {
        assert_eq!(world.get(player).stack_of(ROYAL), 2);
        assert_eq!(world.value(player, Attr::Def), 100.0);
    }
}

#[test]
fn inactivation_fans_out_to_players_who_left() {
    let engine = engine_with([royal().stacks(2)]);
    let (mut world, castle, first, second) = kingdom();
    for _ in 0..2 {
        engine
            .add_buff(&mut world, castle, ROYAL, &complete_building(castle))
            .expect("add should succeed");
    }
    world.leave(castle, second);

    let result = engine
        .inactivate_buff(&mut world, castle, ROYAL)
        .expect("inactivate should succeed");
    assert_eq!(result.propagated.len(), 2);
    for player in [first, second] {
        assert_eq!(world.get(player).stack_of(ROYAL), 1);
        assert_eq!(world.value(player, Attr::Def), 50.0);
    }
}

#[test]
fn target_inactivation_stays_local() {
    let engine = engine_with([royal().stacks(2)]);
    let (mut world, castle, first, second) = kingdom();
    for _ in 0..2 {
        engine
            .add_buff(&mut world, castle, ROYAL, &complete_building(castle))
            .expect("add should succeed");
    }

    let result = engine
        .inactivate_buff(&mut world, first, ROYAL)
        .expect("inactivate should succeed");
    assert!(result.propagated.is_empty());
    assert_eq!(world.value(first, Attr::Def), 50.0);
    assert_eq!(world.value(second, Attr::Def), 100.0);
    assert_eq!(world.get(castle).stack_of(ROYAL), 2);
}

#[test]
fn late_joiners_pull_every_stack() {
    let engine = engine_with([royal().stacks(3)]);
    let (mut world, castle, first, _) = kingdom();
    for _ in 0..2 {
        engine
            .add_buff(&mut world, castle, ROYAL, &complete_building(castle))
            .expect("add should succeed");
    }

    let late = world.player();
    world.join(castle, late);
    let recruited = event(castle, GameEvent::RecruitPlayer);
    let results = engine
        .pull_propagated_buffs(&mut world, castle, late, &recruited)
        .expect("pull should succeed");
    assert_eq!(results.len(), 2);
    assert_eq!(world.get(late).stack_of(ROYAL), 2);
    assert_eq!(world.value(late, Attr::Def), 100.0);
    assert_eq!(world.get(late).received_from(ROYAL), Some(castle));

    // Already caught up.
    let results = engine
        .pull_propagated_buffs(&mut world, castle, late, &recruited)
        .expect("pull should succeed");
    assert!(results.is_empty());
    assert_eq!(world.value(first, Attr::Def), 100.0);

    // Removal at the source reaches the late joiner too.
    engine
        .remove_buff(&mut world, castle, ROYAL)
        .expect("remove should succeed");
    assert_eq!(world.value(late, Attr::Def), 0.0);
}

#[test]
fn pull_skips_buffs_for_other_kinds() {
    let engine = engine_with([BuffSpec::new(ROYAL)
        .modify(Operator::Add, 5.0, Attr::Def)
        .propagates_to([Kind::Equipment])]);
    let mut world = Kingdom::default();
    let castle = world.castle();
    engine
        .add_buff(&mut world, castle, ROYAL, &complete_building(castle))
        .expect("add should succeed");

    let player = world.player();
    world.join(castle, player);
    let results = engine
        .pull_propagated_buffs(&mut world, castle, player, &complete_building(castle))
        .expect("pull should succeed");
    assert!(results.is_empty());
    assert!(!world.get(player).has_buff(ROYAL));
}

// =============================================================================
// Cross-entity derivation
// =============================================================================

#[test]
fn equipment_lends_part_of_its_attack() {
    let engine = engine_with([BuffSpec::new(SHARP)
        .modify(Operator::Multiply, 0.5, Attr::Atk)
        .propagates_to([Kind::Player])
        .propagates_to_attribute(Attr::Atk)]);
    let mut world = Kingdom::default();
    let player = world.player();
    let sword = world.equipment(player);
    world.set_base(player, Attr::Atk, 10.0);
    world.set_base(sword, Attr::Atk, 40.0);

    engine
        .add_buff(&mut world, sword, SHARP, &complete_building(sword))
        .expect("add should succeed");
    assert_eq!(world.value(sword, Attr::Atk), 40.0);
    assert_eq!(world.value(player, Attr::Atk), 30.0);

    let modification = world
        .get(player)
        .attributes
        .get(Attr::Atk)
        .and_then(|attribute| attribute.history().values().next())
        .expect("player should record the lent attack");
    assert_eq!(modification.derived_from, Some(sword));

    engine
        .set_base_value(&mut world, sword, Attr::Atk, 100.0)
        .expect("set base should succeed");
    assert_eq!(world.value(player, Attr::Atk), 60.0);

    engine
        .remove_buff(&mut world, sword, SHARP)
        .expect("remove should succeed");
    assert_eq!(world.value(player, Attr::Atk), 10.0);
}

#[test]
fn propagated_derivations_chain_into_local_ones() {
    let engine = engine_with([
        BuffSpec::new(BANNER)
            .modify(Operator::Multiply, 1.0, Attr::Def)
            .propagates_to([Kind::Player])
            .propagates_to_attribute(Attr::Def),
        BuffSpec::new(VIGOR)
            .modify(Operator::Multiply, 0.5, Attr::Def)
            .to_attribute(Attr::Hp),
        BuffSpec::new(PLATE).modify(Operator::Add, 10.0, Attr::Def),
    ]);
    let mut world = Kingdom::default();
    let castle = world.castle();
    let player = world.player();
    world.join(castle, player);
    world.set_base(castle, Attr::Def, 25.0);
    world.set_base(player, Attr::Def, 100.0);

    engine
        .add_buff(&mut world, player, VIGOR, &complete_building(player))
        .expect("add should succeed");
    assert_eq!(world.value(player, Attr::Hp), 50.0);

    engine
        .add_buff(&mut world, castle, BANNER, &complete_building(castle))
        .expect("add should succeed");
    assert_eq!(world.value(castle, Attr::Def), 25.0);
    assert_eq!(world.value(player, Attr::Def), 125.0);
    assert_eq!(world.value(player, Attr::Hp), 62.5);

    engine
        .add_buff(&mut world, player, PLATE, &complete_building(player))
        .expect("add should succeed");
    assert_eq!(world.value(player, Attr::Def), 135.0);
    assert_eq!(world.value(player, Attr::Hp), 67.5);

    engine
        .set_base_value(&mut world, castle, Attr::Def, 35.0)
        .expect("set base should succeed");
    assert_eq!(world.value(player, Attr::Def), 145.0);
    assert_eq!(world.value(player, Attr::Hp), 72.5);
}
