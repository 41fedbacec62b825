use std::sync::{Mutex, PoisonError};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use uuid::Builder;

use super::config::GameConfig;
use super::rules::RuleError;
use super::state::{Player, PlayerId, Role, SessionState};

/// 角色分配策略。`registered` 为加入前已注册的玩家数。
pub trait RolePolicy: Send + Sync {
    fn assign(&self, registered: usize) -> Role;
}

/// 人数低于上限时按概率独立抽取内鬼，不保证内鬼数量。
#[derive(Debug)]
pub struct RandomRoles {
    probability: f64,
    cap: usize,
    rng: Mutex<SmallRng>,
}

impl RandomRoles {
    pub fn new(probability: f64, cap: usize) -> Self {
        Self::with_rng(probability, cap, SmallRng::from_entropy())
    }

    pub fn with_seed(probability: f64, cap: usize, seed: u64) -> Self {
        Self::with_rng(probability, cap, SmallRng::seed_from_u64(seed))
    }

    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(config.impostor_probability, config.impostor_cap)
    }

    fn with_rng(probability: f64, cap: usize, rng: SmallRng) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self {
            probability,
            cap,
            rng: Mutex::new(rng),
        }
    }
}

impl RolePolicy for RandomRoles {
    fn assign(&self, registered: usize) -> Role {
        if registered >= self.cap {
            return Role::Crew;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        if rng.gen_bool(self.probability) {
            Role::Impostor
        } else {
            Role::Crew
        }
    }
}

/// 按加入顺序使用预设角色，超出部分为船员。
#[derive(Debug, Clone, Default)]
pub struct FixedRoles(pub Vec<Role>);

impl RolePolicy for FixedRoles {
    fn assign(&self, registered: usize) -> Role {
        self.0.get(registered).copied().unwrap_or(Role::Crew)
    }
}

/// 用引擎的随机源生成 UUID v4 格式的玩家标识。
pub fn new_player_id<R: Rng>(rng: &mut R) -> PlayerId {
    Builder::from_random_bytes(rng.gen()).into_uuid().to_string()
}

pub fn normalize_name(raw: &str) -> Result<String, RuleError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RuleError::InvalidInput {
            field: "playerName".into(),
            reason: "display name must not be empty".into(),
        });
    }
    Ok(trimmed.to_string())
}

pub fn role_reveal(name: &str, role: Role) -> String {
    match role {
        Role::Impostor => format!("Welcome {name}! You are the IMPOSTOR 👿"),
        Role::Crew => format!("Welcome {name}! You are CREW 👨‍🚀"),
    }
}

/// 将新玩家登记到会话：玩家表、出生区域，以及内鬼名单。
pub fn admit(state: &mut SessionState, player: Player) -> Result<(), RuleError> {
    let zone_id = player.current_zone.clone();
    let zone = state
        .zone_mut(&zone_id)
        .ok_or_else(|| RuleError::InvalidInput {
            field: "zone".into(),
            reason: format!("unknown zone '{zone_id}'"),
        })?;
    zone.enter(player.id.clone());
    if player.role.is_impostor() {
        state.impostors.push(player.id.clone());
    }
    state.players.push(player);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::{MapTopology, OUTSIDE};

    #[test]
    fn random_roles_never_pick_impostor_at_or_above_cap() {
        let policy = RandomRoles::with_seed(1.0, 5, 7);
        assert_eq!(policy.assign(4), Role::Impostor);
        assert_eq!(policy.assign(5), Role::Crew);
        assert_eq!(policy.assign(12), Role::Crew);
    }

    #[test]
    fn random_roles_respect_probability_extremes() {
        let never = RandomRoles::with_seed(0.0, 5, 1);
        assert!((0..5).all(|n| never.assign(n) == Role::Crew));

        let clamped = RandomRoles::with_seed(3.0, 5, 1);
        assert_eq!(clamped.assign(0), Role::Impostor);
    }

    #[test]
    fn seeded_random_roles_are_reproducible() {
        let first = RandomRoles::with_seed(0.2, 5, 99);
        let second = RandomRoles::with_seed(0.2, 5, 99);
        let a: Vec<Role> = (0..5).map(|n| first.assign(n)).collect();
        let b: Vec<Role> = (0..5).map(|n| second.assign(n)).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn fixed_roles_fall_back_to_crew() {
        let policy = FixedRoles(vec![Role::Impostor]);
        assert_eq!(policy.assign(0), Role::Impostor);
        assert_eq!(policy.assign(1), Role::Crew);
    }

    #[test]
    fn player_ids_are_uuid_v4_shaped() {
        let mut rng = SmallRng::seed_from_u64(3);
        let id = new_player_id(&mut rng);
        let groups: Vec<&str> = id.split('-').collect();
        assert_eq!(
            groups.iter().map(|group| group.len()).collect::<Vec<_>>(),
            vec![8, 4, 4, 4, 12]
        );
        assert!(groups[2].starts_with('4'));
        assert!(matches!(
            groups[3].chars().next(),
            Some('8' | '9' | 'a' | 'b')
        ));
        assert_ne!(id, new_player_id(&mut rng));

        let parsed = uuid::Uuid::parse_str(&id).expect("id should parse as a UUID");
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn names_are_trimmed_and_blank_names_rejected() {
        assert_eq!(normalize_name("  Alice ").expect("valid name"), "Alice");
        assert!(matches!(
            normalize_name("   "),
            Err(RuleError::InvalidInput { .. })
        ));
    }

    #[test]
    fn admit_places_player_in_spawn_and_tracks_impostors() {
        let mut state = SessionState::new(&MapTopology::default(), 0);
        admit(
            &mut state,
            Player::new("i".into(), "Ivy", Role::Impostor, OUTSIDE),
        )
        .expect("admit should succeed");
        admit(&mut state, Player::new("c".into(), "Cal", Role::Crew, OUTSIDE))
            .expect("admit should succeed");

        assert_eq!(state.impostors, vec!["i".to_string()]);
        assert_eq!(
            state.zone(OUTSIDE).map(|zone| zone.occupants.clone()),
            Some(vec!["i".to_string(), "c".to_string()])
        );
        state.integrity_check().expect("state should stay consistent");
    }
}
