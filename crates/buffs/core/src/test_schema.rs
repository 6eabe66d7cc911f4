//! Minimal schema shared by unit tests.

use std::collections::BTreeMap;

use crate::event::BuffEvent;
use crate::schema::{BuffWorld, Schema};
use crate::state::{Buffable, EntityId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TestSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attr {
    Atk,
    Def,
    Hp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Leader,
    Follower,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Tick,
    Hit,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ping(pub EventKind);

#[derive(Debug, Default)]
pub struct TestWorld {
    pub entities: BTreeMap<EntityId, Buffable<TestSchema>>,
    pub followers: Vec<EntityId>,
}

impl TestWorld {
    pub fn spawn(&mut self, buffable: Buffable<TestSchema>) {
        self.entities.insert(buffable.id, buffable);
    }

    pub fn get(&self, id: EntityId) -> &Buffable<TestSchema> {
        &self.entities[&id]
    }
}

impl BuffWorld<TestSchema> for TestWorld {
    fn buffable(&self, id: EntityId) -> Option<&Buffable<TestSchema>> {
        self.entities.get(&id)
    }

    fn buffable_mut(&mut self, id: EntityId) -> Option<&mut Buffable<TestSchema>> {
        self.entities.get_mut(&id)
    }
}

impl Schema for TestSchema {
    type Attribute = Attr;
    type EntityKind = Kind;
    type EventKind = EventKind;
    type Event = Ping;
    type World = TestWorld;

    fn event_kind(event: &Ping) -> EventKind {
        event.0
    }
}

pub fn event() -> BuffEvent<TestSchema> {
    BuffEvent::game(EntityId(1), Ping(EventKind::Tick))
}
