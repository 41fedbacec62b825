use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::game::{Clock, MapTopology, SessionState};

/// 每个分组独立加锁的会话状态。
pub type SharedSession = Arc<Mutex<SessionState>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// 持锁期间发生 panic，状态可能只写了一半。
    Poisoned { group_id: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Poisoned { group_id } => {
                write!(f, "session store lock poisoned (group '{group_id}')")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// 分组标识到会话状态的映射；首次引用时创建。
pub trait SessionStore: Send + Sync {
    fn session(&self, group_id: &str) -> Result<SharedSession, StoreError>;

    fn group_ids(&self) -> Result<Vec<String>, StoreError>;

    /// 在该分组的锁内完成整个读-检查-写过程。
    fn with_session<R>(
        &self,
        group_id: &str,
        f: impl FnOnce(&mut SessionState) -> R,
    ) -> Result<R, StoreError>
    where
        Self: Sized,
    {
        let session = self.session(group_id)?;
        let mut state = session.lock().map_err(|_| StoreError::Poisoned {
            group_id: group_id.to_string(),
        })?;
        Ok(f(&mut state))
    }
}

type SessionFactory = Box<dyn Fn() -> SessionState + Send + Sync>;

/// 进程内存储，进程结束即丢失。
pub struct InMemoryStore {
    sessions: Mutex<HashMap<String, SharedSession>>,
    factory: SessionFactory,
}

impl InMemoryStore {
    pub fn new(factory: impl Fn() -> SessionState + Send + Sync + 'static) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            factory: Box::new(factory),
        }
    }

    pub fn with_topology(topology: MapTopology, clock: Clock) -> Self {
        Self::new(move || SessionState::new(&topology, clock()))
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .map(|sessions| sessions.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::with_topology(MapTopology::default(), crate::utils::now_ms)
    }
}

impl SessionStore for InMemoryStore {
    fn session(&self, group_id: &str) -> Result<SharedSession, StoreError> {
        let mut sessions = self.sessions.lock().map_err(|_| StoreError::Poisoned {
            group_id: group_id.to_string(),
        })?;
        let session = sessions.entry(group_id.to_string()).or_insert_with(|| {
            log::info!("creating session for group {group_id}");
            Arc::new(Mutex::new((self.factory)()))
        });
        Ok(Arc::clone(session))
    }

    fn group_ids(&self) -> Result<Vec<String>, StoreError> {
        let sessions = self.sessions.lock().map_err(|_| StoreError::Poisoned {
            group_id: String::new(),
        })?;
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;
    use crate::game::map::{GARAGE, HOUSE_1, HOUSE_2, OUTSIDE};
    use crate::game::{ActionEngine, ActionOutcome, FixedRoles, GameConfig, Role};

    fn fixed_clock() -> u64 {
        7
    }

    fn store() -> InMemoryStore {
        InMemoryStore::with_topology(MapTopology::default(), fixed_clock)
    }

    #[test]
    fn sessions_are_created_lazily_once_per_group() {
        let store = store();
        assert!(store.is_empty());

        let first = store.session("g1").expect("store should not be poisoned");
        let again = store.session("g1").expect("store should not be poisoned");
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(store.len(), 1);

        let state = first.lock().expect("session lock").clone();
        assert_eq!(state, SessionState::new(&MapTopology::default(), 7));
    }

    #[test]
    fn groups_are_independent() {
        let store = store();
        let engine = ActionEngine::with_seed(GameConfig::default(), 1).with_clock(fixed_clock);
        store
            .with_session("a", |state| engine.join(state, "Alice"))
            .expect("store should not be poisoned")
            .expect("join should succeed");

        let other = store
            .with_session("b", |state| state.clone())
            .expect("store should not be poisoned");
        assert!(other.players.is_empty());
        assert_eq!(
            store.group_ids().expect("store should not be poisoned"),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn concurrent_first_references_converge_on_one_session() {
        let store = Arc::new(store());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store.session("fresh").expect("store should not be poisoned")
                })
            })
            .collect();

        let sessions: Vec<SharedSession> = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread should not panic"))
            .collect();
        assert!(sessions
            .windows(2)
            .all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_actions_on_one_session_keep_occupancy_consistent() {
        let store = Arc::new(store());
        let engine = Arc::new(
            ActionEngine::with_seed(GameConfig::default(), 4)
                .with_roles(FixedRoles(vec![Role::Impostor]))
                .with_clock(fixed_clock),
        );

        let ids: Vec<String> = (0..6)
            .map(|n| {
                let outcome = store
                    .with_session("busy", |state| engine.join(state, &format!("P{n}")))
                    .expect("store should not be poisoned")
                    .expect("join should succeed");
                match outcome {
                    ActionOutcome::Joined { player, .. } => player.id,
                    other => panic!("unexpected outcome {other:?}"),
                }
            })
            .collect();

        let zones = [OUTSIDE, HOUSE_1, HOUSE_2, GARAGE];
        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .enumerate()
            .map(|(n, id)| {
                let store = Arc::clone(&store);
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for step in 0..200 {
                        let zone = zones[(n + step) % zones.len()];
                        let _ = store
                            .with_session("busy", |state| {
                                if step % 7 == 0 {
                                    engine.eliminate(state, &id)
                                } else {
                                    engine.move_player(state, &id, zone)
                                }
                            })
                            .expect("store should not be poisoned");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread should not panic");
        }

        store
            .with_session("busy", |state| state.integrity_check())
            .expect("store should not be poisoned")
            .expect("occupancy should stay consistent");
    }
}
