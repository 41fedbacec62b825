use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::state::PlayerId;

/// 区域标识。
pub type ZoneId = String;

pub const OUTSIDE: &str = "outside";
pub const HOUSE_1: &str = "house_1";
pub const HOUSE_2: &str = "house_2";
pub const GARAGE: &str = "garage";

/// 默认地图：一个室外区域（出生点）加三个室内区域。
pub static DEFAULT_TOPOLOGY: Lazy<MapTopology> = Lazy::new(|| MapTopology {
    zones: vec![
        ZoneDef::new(OUTSIDE, ZoneKind::Open, "Outside").with_aliases(["exterior"]),
        ZoneDef::new(HOUSE_1, ZoneKind::Enclosed, "House 1").with_aliases(["casa1"]),
        ZoneDef::new(HOUSE_2, ZoneKind::Enclosed, "House 2").with_aliases(["casa2"]),
        ZoneDef::new(GARAGE, ZoneKind::Enclosed, "Garage").with_aliases(["garaje"]),
    ],
    spawn: OUTSIDE.to_string(),
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Open,
    Enclosed,
}

/// 静态区域定义。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ZoneDef {
    pub id: ZoneId,
    pub kind: ZoneKind,
    #[serde(default)]
    pub label: String,
    /// 客户端可用的其他名称，移动时解析为 `id`。
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl ZoneDef {
    pub fn new(id: impl Into<String>, kind: ZoneKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    fn answers_to(&self, name: &str) -> bool {
        self.id == name || self.aliases.iter().any(|alias| alias == name)
    }
}

/// 会话中的区域及其当前占用者（按进入顺序）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Zone {
    pub id: ZoneId,
    pub kind: ZoneKind,
    #[serde(default)]
    pub occupants: Vec<PlayerId>,
}

impl Zone {
    pub fn contains(&self, player_id: &str) -> bool {
        self.occupants.iter().any(|id| id == player_id)
    }

    pub fn enter(&mut self, player_id: PlayerId) {
        if !self.contains(&player_id) {
            self.occupants.push(player_id);
        }
    }

    pub fn leave(&mut self, player_id: &str) {
        self.occupants.retain(|id| id != player_id);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum TopologyError {
    Empty,
    DuplicateZone { zone_id: ZoneId },
    UnknownSpawn { zone_id: ZoneId },
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyError::Empty => write!(f, "map has no zones"),
            TopologyError::DuplicateZone { zone_id } => {
                write!(f, "zone '{zone_id}' is defined more than once")
            }
            TopologyError::UnknownSpawn { zone_id } => {
                write!(f, "spawn zone '{zone_id}' is not part of the map")
            }
        }
    }
}

impl std::error::Error for TopologyError {}

/// 地图目录，新会话从这里复制区域。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MapTopology {
    pub zones: Vec<ZoneDef>,
    pub spawn: ZoneId,
}

impl MapTopology {
    pub fn spawn_zone(&self) -> &str {
        &self.spawn
    }

    pub fn get(&self, zone_id: &str) -> Option<&ZoneDef> {
        self.zones.iter().find(|zone| zone.id == zone_id)
    }

    /// 按标识或别名查找区域。
    pub fn resolve(&self, name: &str) -> Option<&ZoneDef> {
        self.zones.iter().find(|zone| zone.answers_to(name))
    }

    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.zones.is_empty() {
            return Err(TopologyError::Empty);
        }

        let mut seen = HashSet::new();
        for zone in &self.zones {
            for name in std::iter::once(&zone.id).chain(&zone.aliases) {
                if !seen.insert(name.as_str()) {
                    return Err(TopologyError::DuplicateZone {
                        zone_id: name.clone(),
                    });
                }
            }
        }

        if self.get(&self.spawn).is_none() {
            return Err(TopologyError::UnknownSpawn {
                zone_id: self.spawn.clone(),
            });
        }

        Ok(())
    }

    pub fn instantiate(&self) -> Vec<Zone> {
        self.zones
            .iter()
            .map(|def| Zone {
                id: def.id.clone(),
                kind: def.kind,
                occupants: Vec::new(),
            })
            .collect()
    }
}

impl Default for MapTopology {
    fn default() -> Self {
        DEFAULT_TOPOLOGY.clone()
    }
}
