use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::config::GameConfig;
use super::map::ZoneId;
use super::registry::{self, RandomRoles, RolePolicy};
use super::state::{EmergencyReport, IntegrityError, Player, PlayerId, Role, SessionState};
use crate::utils;

/// 破坏公告中给船员的处理时限（仅用于文案）。
pub const SABOTAGE_WINDOW_MINUTES: u32 = 5;

/// 返回毫秒级 Unix 时间戳。
pub type Clock = fn() -> u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    GetState,
    Register,
    Move,
    Eliminate,
    Sabotage,
    Report,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetState => "get_state",
            Self::Register => "register",
            Self::Move => "move",
            Self::Eliminate => "eliminate",
            Self::Sabotage => "sabotage",
            Self::Report => "report",
        }
    }
}

impl FromStr for ActionKind {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "get_state" | "state" => Ok(ActionKind::GetState),
            "register" | "join" => Ok(ActionKind::Register),
            "move" | "mover" => Ok(ActionKind::Move),
            "eliminate" | "kill" | "matar" => Ok(ActionKind::Eliminate),
            "sabotage" | "sabotear" => Ok(ActionKind::Sabotage),
            "report" | "reportar" => Ok(ActionKind::Report),
            other => Err(RuleError::InvalidInput {
                field: "action".into(),
                reason: format!("unknown action '{other}'"),
            }),
        }
    }
}

/// 错误分类，决定传输层的状态码。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    InvalidActor,
    NotAuthorized,
    NoTarget,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RuleError {
    InvalidInput {
        field: String,
        reason: String,
    },
    InvalidActor {
        player_id: PlayerId,
    },
    NotAuthorized {
        player_id: PlayerId,
        action: ActionKind,
    },
    NoTarget {
        player_id: PlayerId,
        zone: ZoneId,
    },
    IntegrityViolation {
        error: IntegrityError,
    },
}

impl RuleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuleError::InvalidInput { .. } => ErrorKind::InvalidInput,
            RuleError::InvalidActor { .. } => ErrorKind::InvalidActor,
            RuleError::NotAuthorized { .. } => ErrorKind::NotAuthorized,
            RuleError::NoTarget { .. } => ErrorKind::NoTarget,
            RuleError::IntegrityViolation { .. } => ErrorKind::Internal,
        }
    }

    pub fn missing(field: &str) -> Self {
        RuleError::InvalidInput {
            field: field.into(),
            reason: format!("missing required field '{field}'"),
        }
    }
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::InvalidInput { reason, .. } => write!(f, "{reason}"),
            RuleError::InvalidActor { .. } => write!(f, "Invalid player"),
            RuleError::NotAuthorized { action, .. } => match action {
                ActionKind::Eliminate => write!(f, "You cannot eliminate"),
                ActionKind::Sabotage => write!(f, "Only impostors can sabotage"),
                other => write!(f, "Not allowed to {}", other.as_str()),
            },
            RuleError::NoTarget { .. } => write!(f, "No victims available"),
            RuleError::IntegrityViolation { error } => {
                write!(f, "session state is inconsistent: {error}")
            }
        }
    }
}

impl std::error::Error for RuleError {}

/// 单个动作的结果。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Joined {
        player: Player,
        message: String,
    },
    Moved {
        zone: ZoneId,
        occupants: Vec<String>,
    },
    Eliminated {
        victim: String,
        #[serde(rename = "victimId")]
        victim_id: PlayerId,
        zone: ZoneId,
        message: String,
    },
    Sabotaged {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        message: String,
    },
    EmergencyReported {
        report: EmergencyReport,
        message: String,
    },
    Snapshot {
        state: SessionState,
    },
}

impl ActionOutcome {
    /// 面向全体玩家的广播文案。
    pub fn broadcast(&self) -> Option<&str> {
        match self {
            ActionOutcome::Eliminated { message, .. }
            | ActionOutcome::Sabotaged { message, .. }
            | ActionOutcome::EmergencyReported { message, .. } => Some(message),
            _ => None,
        }
    }
}

pub struct ActionEngine {
    config: GameConfig,
    roles: Box<dyn RolePolicy>,
    ids: Mutex<SmallRng>,
    clock: Clock,
}

impl ActionEngine {
    pub fn new(config: GameConfig) -> Self {
        let roles = RandomRoles::from_config(&config);
        Self {
            config,
            roles: Box::new(roles),
            ids: Mutex::new(SmallRng::from_entropy()),
            clock: utils::now_ms,
        }
    }

    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        let roles = RandomRoles::with_seed(
            config.impostor_probability,
            config.impostor_cap,
            seed,
        );
        Self {
            config,
            roles: Box::new(roles),
            ids: Mutex::new(SmallRng::seed_from_u64(seed.wrapping_add(1))),
            clock: utils::now_ms,
        }
    }

    pub fn with_roles(mut self, roles: impl RolePolicy + 'static) -> Self {
        self.roles = Box::new(roles);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn now(&self) -> u64 {
        (self.clock)()
    }

    pub fn new_session(&self) -> SessionState {
        SessionState::new(&self.config.topology, self.now())
    }

    fn ensure_integrity(state: &SessionState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    fn living_player<'a>(state: &'a SessionState, player_id: &str) -> Result<&'a Player, RuleError> {
        state
            .player(player_id)
            .filter(|player| player.alive)
            .ok_or_else(|| RuleError::InvalidActor {
                player_id: player_id.to_string(),
            })
    }

    fn fresh_player_id(&self, state: &SessionState) -> PlayerId {
        let mut rng = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let id = registry::new_player_id(&mut *rng);
            if !state.contains_player(&id) {
                return id;
            }
        }
    }

    pub fn join(
        &self,
        state: &mut SessionState,
        display_name: &str,
    ) -> Result<ActionOutcome, RuleError> {
        Self::ensure_integrity(state)?;
        let name = registry::normalize_name(display_name)?;

        let spawn = self.config.topology.spawn_zone();
        if state.zone(spawn).is_none() {
            return Err(RuleError::InvalidInput {
                field: "zone".into(),
                reason: format!("unknown zone '{spawn}'"),
            });
        }

        let id = self.fresh_player_id(state);
        let role = self.roles.assign(state.players.len());
        let player = Player::new(id, name, role, spawn);
        registry::admit(state, player.clone())?;
        state.touch(self.now());

        log::info!("player {} joined as {:?}", player.id, role);
        let message = registry::role_reveal(&player.name, role);
        Ok(ActionOutcome::Joined { player, message })
    }

    pub fn move_player(
        &self,
        state: &mut SessionState,
        player_id: &str,
        target: &str,
    ) -> Result<ActionOutcome, RuleError> {
        Self::ensure_integrity(state)?;
        let from = Self::living_player(state, player_id)?.current_zone.clone();
        let target = self
            .config
            .topology
            .resolve(target)
            .map_or(target, |zone| zone.id.as_str());
        if state.zone(target).is_none() {
            return Err(RuleError::InvalidInput {
                field: "parameter".into(),
                reason: format!("unknown zone '{target}'"),
            });
        }

        if let Some(zone) = state.zone_mut(&from) {
            zone.leave(player_id);
        }
        if let Some(zone) = state.zone_mut(target) {
            zone.enter(player_id.to_string());
        }
        if let Some(player) = state.player_mut(player_id) {
            player.current_zone = target.to_string();
        }
        state.touch(self.now());

        log::debug!("player {player_id} moved {from} -> {target}");
        Ok(ActionOutcome::Moved {
            zone: target.to_string(),
            occupants: state.occupant_names(target),
        })
    }

    pub fn eliminate(
        &self,
        state: &mut SessionState,
        actor_id: &str,
    ) -> Result<ActionOutcome, RuleError> {
        Self::ensure_integrity(state)?;
        let actor = state
            .player(actor_id)
            .filter(|player| player.role.is_impostor() && player.alive)
            .ok_or_else(|| RuleError::NotAuthorized {
                player_id: actor_id.to_string(),
                action: ActionKind::Eliminate,
            })?;
        let zone_id = actor.current_zone.clone();

        // 按区域内的进入顺序取第一个存活船员
        let victim_id = state
            .zone(&zone_id)
            .and_then(|zone| {
                zone.occupants.iter().find(|id| {
                    id.as_str() != actor_id
                        && state
                            .player(id)
                            .is_some_and(|player| player.alive && player.role == Role::Crew)
                })
            })
            .cloned()
            .ok_or_else(|| RuleError::NoTarget {
                player_id: actor_id.to_string(),
                zone: zone_id.clone(),
            })?;

        let mut victim = String::new();
        if let Some(player) = state.player_mut(&victim_id) {
            player.alive = false;
            victim = player.name.clone();
        }
        if let Some(zone) = state.zone_mut(&zone_id) {
            zone.leave(&victim_id);
        }
        state.touch(self.now());

        log::info!("player {victim_id} eliminated in {zone_id}");
        let message = format!("💀 {victim} was found dead in {zone_id}");
        Ok(ActionOutcome::Eliminated {
            victim,
            victim_id,
            zone: zone_id,
            message,
        })
    }

    /// 只产生广播，不改变会话状态；不检查发起者是否存活。
    pub fn sabotage(
        &self,
        state: &SessionState,
        actor_id: &str,
        kind: Option<&str>,
    ) -> Result<ActionOutcome, RuleError> {
        Self::ensure_integrity(state)?;
        state
            .player(actor_id)
            .filter(|player| player.role.is_impostor())
            .ok_or_else(|| RuleError::NotAuthorized {
                player_id: actor_id.to_string(),
                action: ActionKind::Sabotage,
            })?;

        log::info!("sabotage triggered by {actor_id}");
        Ok(ActionOutcome::Sabotaged {
            kind: kind.map(str::to_string),
            message: format!(
                "⚡ SABOTAGE! The crew has {SABOTAGE_WINDOW_MINUTES} minutes to fix it"
            ),
        })
    }

    pub fn report_emergency(
        &self,
        state: &mut SessionState,
        reporter_id: &str,
    ) -> Result<ActionOutcome, RuleError> {
        Self::ensure_integrity(state)?;
        let reporter = Self::living_player(state, reporter_id)?;
        let name = reporter.name.clone();
        let now = self.now();
        let report = EmergencyReport {
            reporter_id: reporter_id.to_string(),
            zone_id: reporter.current_zone.clone(),
            timestamp: now,
        };

        state.record_emergency(report.clone());
        state.touch(now);

        log::info!("emergency reported by {reporter_id} in {}", report.zone_id);
        let message = format!("🚨 {name} reported an emergency in {}", report.zone_id);
        Ok(ActionOutcome::EmergencyReported { report, message })
    }

    pub fn get_state(&self, state: &SessionState) -> ActionOutcome {
        ActionOutcome::Snapshot {
            state: state.clone(),
        }
    }
}
