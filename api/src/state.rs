use crate::engine::MissionEngine;
use crate::store::MissionStore;
use crate::store::postgres::PgStore;

#[derive(Clone)]
pub struct AppState<S = PgStore> {
    pub store: S,
    pub missions: MissionEngine<S>,
}

impl<S: MissionStore> AppState<S> {
    pub fn new(store: S) -> Self {
        let missions = MissionEngine::new(store.clone());
        Self { store, missions }
    }
}
