use serde::{Deserialize, Serialize};

use super::store::{InMemoryStore, SessionStore, StoreError};
use crate::game::{
    ActionEngine, ActionKind, ActionOutcome, ErrorKind, GameConfig, RuleError, SessionState,
};

/// 客户端发来的动作请求。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(default)]
    pub group_id: String,
    pub action: String,
    #[serde(default, alias = "playerId", skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

impl ActionRequest {
    pub fn new(group_id: impl Into<String>, action: ActionKind) -> Self {
        Self {
            group_id: group_id.into(),
            action: action.as_str().to_string(),
            ..Self::default()
        }
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.player_name = Some(name.into());
        self
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    fn actor(&self) -> Result<&str, RuleError> {
        self.actor_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RuleError::missing("actorId"))
    }
}

/// `{ success, ...动作字段, error? }`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DispatchResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: Option<ActionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "errorKind", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl DispatchResponse {
    pub fn success(outcome: ActionOutcome) -> Self {
        Self {
            success: true,
            outcome: Some(outcome),
            error: None,
            kind: None,
        }
    }

    pub fn failure(error: &RuleError) -> Self {
        let kind = error.kind();
        let message = match kind {
            ErrorKind::Internal => "Internal server error".to_string(),
            _ => error.to_string(),
        };
        Self {
            success: false,
            outcome: None,
            error: Some(message),
            kind: Some(kind),
        }
    }
}

/// 将请求路由到动作引擎，并对所属分组加锁。
pub struct Dispatcher<S: SessionStore = InMemoryStore> {
    store: S,
    engine: ActionEngine,
}

impl Dispatcher<InMemoryStore> {
    pub fn new(config: GameConfig) -> Self {
        Self::from_engine(ActionEngine::new(config))
    }

    pub fn from_engine(engine: ActionEngine) -> Self {
        let store =
            InMemoryStore::with_topology(engine.config().topology.clone(), engine.clock());
        Self { store, engine }
    }
}

impl Default for Dispatcher<InMemoryStore> {
    fn default() -> Self {
        Self::new(GameConfig::default())
    }
}

impl<S: SessionStore> Dispatcher<S> {
    pub fn with_store(store: S, engine: ActionEngine) -> Self {
        Self { store, engine }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn engine(&self) -> &ActionEngine {
        &self.engine
    }

    pub fn dispatch(&self, request: &ActionRequest) -> Result<DispatchResponse, StoreError> {
        if request.group_id.trim().is_empty() {
            return Ok(Self::respond(request, Err(RuleError::missing("groupId"))));
        }
        let command = match Command::parse(request) {
            Ok(command) => command,
            Err(error) => return Ok(Self::respond(request, Err(error))),
        };

        let result = self
            .store
            .with_session(&request.group_id, |state| self.apply(state, &command))?;
        Ok(Self::respond(request, result))
    }

    /// 不经过存储，直接作用于调用方持有的状态。
    pub fn apply_to(&self, state: &mut SessionState, request: &ActionRequest) -> DispatchResponse {
        let result = Command::parse(request).and_then(|command| self.apply(state, &command));
        Self::respond(request, result)
    }

    fn respond(
        request: &ActionRequest,
        result: Result<ActionOutcome, RuleError>,
    ) -> DispatchResponse {
        match result {
            Ok(outcome) => {
                log::debug!("{} applied to group {}", request.action, request.group_id);
                DispatchResponse::success(outcome)
            }
            Err(error) => {
                if error.kind() == ErrorKind::Internal {
                    log::error!("group {}: {error}", request.group_id);
                } else {
                    log::warn!(
                        "{} rejected in group {}: {error}",
                        request.action,
                        request.group_id
                    );
                }
                DispatchResponse::failure(&error)
            }
        }
    }

    pub fn snapshot(&self, group_id: &str) -> Result<SessionState, StoreError> {
        self.store.with_session(group_id, |state| state.clone())
    }

    fn apply(
        &self,
        state: &mut SessionState,
        command: &Command<'_>,
    ) -> Result<ActionOutcome, RuleError> {
        match *command {
            Command::GetState => Ok(self.engine.get_state(state)),
            Command::Register { name } => self.engine.join(state, name),
            Command::Move { actor, target } => self.engine.move_player(state, actor, target),
            Command::Eliminate { actor } => self.engine.eliminate(state, actor),
            Command::Sabotage { actor, kind } => self.engine.sabotage(state, actor, kind),
            Command::Report { actor } => self.engine.report_emergency(state, actor),
        }
    }
}

/// 加锁前完成字段校验后的请求。
enum Command<'a> {
    GetState,
    Register { name: &'a str },
    Move { actor: &'a str, target: &'a str },
    Eliminate { actor: &'a str },
    Sabotage { actor: &'a str, kind: Option<&'a str> },
    Report { actor: &'a str },
}

impl<'a> Command<'a> {
    fn parse(request: &'a ActionRequest) -> Result<Self, RuleError> {
        let action = request.action.parse::<ActionKind>()?;

        Ok(match action {
            ActionKind::GetState => Command::GetState,
            ActionKind::Register => Command::Register {
                name: request
                    .player_name
                    .as_deref()
                    .or(request.parameter.as_deref())
                    .ok_or_else(|| RuleError::missing("playerName"))?,
            },
            ActionKind::Move => Command::Move {
                actor: request.actor()?,
                target: request
                    .parameter
                    .as_deref()
                    .ok_or_else(|| RuleError::missing("parameter"))?,
            },
            ActionKind::Eliminate => Command::Eliminate {
                actor: request.actor()?,
            },
            ActionKind::Sabotage => Command::Sabotage {
                actor: request.actor()?,
                kind: request.parameter.as_deref(),
            },
            ActionKind::Report => Command::Report {
                actor: request.actor()?,
            },
        })
    }
}
