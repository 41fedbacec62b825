use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::map::{MapTopology, Zone, ZoneId};

/// 玩家标识（会话内唯一）。
pub type PlayerId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Crew,
    Impostor,
}

impl Role {
    pub fn is_impostor(self) -> bool {
        matches!(self, Role::Impostor)
    }
}

/// 玩家状态。只能通过加入动作创建，淘汰后保留记录。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub role: Role,
    pub alive: bool,
    pub current_zone: ZoneId,
    #[serde(default)]
    pub tasks_completed: u32,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, role: Role, zone: impl Into<ZoneId>) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            alive: true,
            current_zone: zone.into(),
            tasks_completed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    #[default]
    Active,
    Ended,
}

/// 紧急报告记录。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyReport {
    pub reporter_id: PlayerId,
    pub zone_id: ZoneId,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    DuplicatePlayer { player_id: PlayerId },
    UnknownOccupant { zone_id: ZoneId, player_id: PlayerId },
    DuplicateOccupant { zone_id: ZoneId, player_id: PlayerId },
    LocationMismatch { player_id: PlayerId, expected: ZoneId },
    DeadPlayerOnMap { player_id: PlayerId, zone_id: ZoneId },
    ImpostorListMismatch,
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityError::DuplicatePlayer { player_id } => {
                write!(f, "player id '{player_id}' is registered more than once")
            }
            IntegrityError::UnknownOccupant { zone_id, player_id } => {
                write!(f, "zone '{zone_id}' lists unknown player '{player_id}'")
            }
            IntegrityError::DuplicateOccupant { zone_id, player_id } => {
                write!(f, "zone '{zone_id}' lists player '{player_id}' twice")
            }
            IntegrityError::LocationMismatch { player_id, expected } => write!(
                f,
                "player '{player_id}' is not listed exactly once, in zone '{expected}'"
            ),
            IntegrityError::DeadPlayerOnMap { player_id, zone_id } => write!(
                f,
                "eliminated player '{player_id}' is still listed in zone '{zone_id}'"
            ),
            IntegrityError::ImpostorListMismatch => {
                write!(f, "impostor list does not match player roles")
            }
        }
    }
}

impl std::error::Error for IntegrityError {}

/// 单个分组的会话状态（唯一可信来源）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub players: Vec<Player>,
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub impostors: Vec<PlayerId>,
    #[serde(default)]
    pub emergencies: Vec<EmergencyReport>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub last_updated: u64,
}

impl SessionState {
    pub fn new(topology: &MapTopology, created_at: u64) -> Self {
        Self {
            players: Vec::new(),
            zones: topology.instantiate(),
            impostors: Vec::new(),
            emergencies: Vec::new(),
            status: SessionStatus::default(),
            last_updated: created_at,
        }
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.id == id)
    }

    pub fn zone(&self, id: &str) -> Option<&Zone> {
        self.zones.iter().find(|zone| zone.id == id)
    }

    pub fn zone_mut(&mut self, id: &str) -> Option<&mut Zone> {
        self.zones.iter_mut().find(|zone| zone.id == id)
    }

    /// 当前列出该玩家的区域。
    pub fn zone_of(&self, player_id: &str) -> Option<&Zone> {
        self.zones.iter().find(|zone| zone.contains(player_id))
    }

    pub fn contains_player(&self, id: &str) -> bool {
        self.player(id).is_some()
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|player| player.alive).count()
    }

    pub fn occupant_names(&self, zone_id: &str) -> Vec<String> {
        self.zone(zone_id)
            .map(|zone| {
                zone.occupants
                    .iter()
                    .filter_map(|id| self.player(id))
                    .map(|player| player.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn record_emergency(&mut self, report: EmergencyReport) {
        self.emergencies.push(report);
    }

    pub fn touch(&mut self, now: u64) {
        self.last_updated = now;
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let mut ids = HashSet::new();
        for player in &self.players {
            if !ids.insert(player.id.as_str()) {
                return Err(IntegrityError::DuplicatePlayer {
                    player_id: player.id.clone(),
                });
            }
        }

        for zone in &self.zones {
            let mut seen = HashSet::new();
            for occupant in &zone.occupants {
                let Some(player) = self.player(occupant) else {
                    return Err(IntegrityError::UnknownOccupant {
                        zone_id: zone.id.clone(),
                        player_id: occupant.clone(),
                    });
                };
                if !seen.insert(occupant.as_str()) {
                    return Err(IntegrityError::DuplicateOccupant {
                        zone_id: zone.id.clone(),
                        player_id: occupant.clone(),
                    });
                }
                if !player.alive {
                    return Err(IntegrityError::DeadPlayerOnMap {
                        player_id: occupant.clone(),
                        zone_id: zone.id.clone(),
                    });
                }
            }
        }

        for player in self.players.iter().filter(|player| player.alive) {
            let listed: Vec<&Zone> = self
                .zones
                .iter()
                .filter(|zone| zone.contains(&player.id))
                .collect();
            if listed.len() != 1 || listed[0].id != player.current_zone {
                return Err(IntegrityError::LocationMismatch {
                    player_id: player.id.clone(),
                    expected: player.current_zone.clone(),
                });
            }
        }

        let expected = self
            .players
            .iter()
            .filter(|player| player.role.is_impostor())
            .map(|player| &player.id);
        if !expected.eq(self.impostors.iter()) {
            return Err(IntegrityError::ImpostorListMismatch);
        }

        Ok(())
    }
}
