//! Shared fixtures: a small kingdom of castles, players and equipment.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

use buffs_core::{
    BuffEngine, BuffEvent, BuffId, BuffSpec, BuffWorld, Buffable, ConditionArg, EntityId,
    Registry, Schema,
};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Game;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attr {
    MaxHp,
    Hp,
    Atk,
    Def,
    CritChance,
    CritDamage,
    BonusCoins,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Castle,
    Player,
    Equipment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameEventKind {
    CompleteBuilding,
    RecruitPlayer,
    Damage,
    Fart,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    CompleteBuilding,
    RecruitPlayer,
    Damage { amount: f64 },
    Fart,
}

impl GameEvent {
    pub fn kind(&self) -> GameEventKind {
        match self {
            Self::CompleteBuilding => GameEventKind::CompleteBuilding,
            Self::RecruitPlayer => GameEventKind::RecruitPlayer,
            Self::Damage { .. } => GameEventKind::Damage,
            Self::Fart => GameEventKind::Fart,
        }
    }
}

impl Schema for Game {
    type Attribute = Attr;
    type EntityKind = Kind;
    type EventKind = GameEventKind;
    type Event = GameEvent;
    type World = Kingdom;

    fn event_kind(event: &GameEvent) -> GameEventKind {
        event.kind()
    }
}

#[derive(Debug, Default)]
pub struct Kingdom {
    pub entities: BTreeMap<EntityId, Buffable<Game>>,
    pub castle_players: BTreeMap<EntityId, Vec<EntityId>>,
    pub equipment_owner: BTreeMap<EntityId, EntityId>,
    pub burning: BTreeSet<EntityId>,
    next_id: u32,
}

impl Kingdom {
    fn spawn(&mut self, kind: Kind) -> EntityId {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        self.entities.insert(id, Buffable::new(id, kind));
        id
    }

    pub fn castle(&mut self) -> EntityId {
        let id = self.spawn(Kind::Castle);
        self.castle_players.insert(id, Vec::new());
        id
    }

    pub fn player(&mut self) -> EntityId {
        self.spawn(Kind::Player)
    }

    pub fn equipment(&mut self, owner: EntityId) -> EntityId {
        let id = self.spawn(Kind::Equipment);
        self.equipment_owner.insert(id, owner);
        id
    }

    pub fn join(&mut self, castle: EntityId, player: EntityId) {
        self.castle_players.entry(castle).or_default().push(player);
    }

    pub fn leave(&mut self, castle: EntityId, player: EntityId) {
        if let Some(players) = self.castle_players.get_mut(&castle) {
            players.retain(|p| *p != player);
        }
    }

    /// Sets a base value directly, before any buff reads it.
    pub fn set_base(&mut self, entity: EntityId, attribute: Attr, value: f64) {
        self.entities
            .get_mut(&entity)
            .expect("entity should exist")
            .attributes
            .set_base(attribute, value);
    }

    pub fn get(&self, entity: EntityId) -> &Buffable<Game> {
        &self.entities[&entity]
    }

    pub fn value(&self, entity: EntityId, attribute: Attr) -> f64 {
        self.get(entity).attribute_value(attribute)
    }
}

impl BuffWorld<Game> for Kingdom {
    fn buffable(&self, id: EntityId) -> Option<&Buffable<Game>> {
        self.entities.get(&id)
    }

    fn buffable_mut(&mut self, id: EntityId) -> Option<&mut Buffable<Game>> {
        self.entities.get_mut(&id)
    }
}

fn number(args: &[ConditionArg]) -> f64 {
    args.first()
        .and_then(ConditionArg::as_number)
        .expect("condition takes a numeric argument")
}

/// Registry with the kingdom's resolvers and conditions.
pub fn registry() -> Registry<Game> {
    let mut registry = Registry::<Game>::new();
    registry
        .register_propagation(Kind::Castle, Kind::Player, |world: &Kingdom, castle| {
            world
                .castle_players
                .get(&castle.id)
                .cloned()
                .unwrap_or_default()
        })
        .register_propagation(Kind::Equipment, Kind::Player, |world: &Kingdom, equipment| {
            world
                .equipment_owner
                .get(&equipment.id)
                .copied()
                .into_iter()
                .collect()
        })
        .register_condition("has_buff", |ctx, args| {
            ctx.entity.has_buff(BuffId(number(args) as u32))
        })
        .register_condition("is_healthy", |ctx, _| {
            ctx.entity.attribute_value(Attr::Hp) > 0.0
        })
        .register_condition("is_burning", |ctx, _| {
            ctx.world.burning.contains(&ctx.entity.id)
        })
        .register_condition("has_players", |ctx, args| {
            let players = ctx
                .world
                .castle_players
                .get(&ctx.entity.id)
                .map_or(0, Vec::len);
            players as f64 >= number(args)
        })
        .register_condition("damage_above", |ctx, args| {
            matches!(
                ctx.event.payload(),
                Some(GameEvent::Damage { amount }) if *amount > number(args)
            )
        });
    registry
}

pub fn engine() -> BuffEngine<Game> {
    init_tracing();
    BuffEngine::new(registry())
}

pub fn engine_with(specs: impl IntoIterator<Item = BuffSpec<Game>>) -> BuffEngine<Game> {
    let mut engine = engine();
    for spec in specs {
        engine.registry_mut().register_buff(spec);
    }
    engine
}

pub fn event(entity: EntityId, event: GameEvent) -> BuffEvent<Game> {
    BuffEvent::game(entity, event)
}

pub fn complete_building(entity: EntityId) -> BuffEvent<Game> {
    event(entity, GameEvent::CompleteBuilding)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
