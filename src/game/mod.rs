//! 游戏核心逻辑模块（地图、玩家登记、会话状态与动作引擎）。

pub mod config;
pub mod map;
pub mod registry;
pub mod rules;
pub mod state;

pub use config::{ConfigError, GameConfig};
pub use map::{MapTopology, TopologyError, Zone, ZoneDef, ZoneId, ZoneKind, DEFAULT_TOPOLOGY};
pub use registry::{FixedRoles, RandomRoles, RolePolicy};
pub use rules::{ActionEngine, ActionKind, ActionOutcome, Clock, ErrorKind, RuleError};
pub use state::{
    EmergencyReport, IntegrityError, Player, PlayerId, Role, SessionState, SessionStatus,
};
