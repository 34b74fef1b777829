//! Snapshot reconciliation on the joining/spectator side.
//!
//! Turns each arriving state snapshot into updated local entity mirrors
//! that rendering reads. Reconciliation is a pure function of (previous
//! mirrors, latest snapshot); no snapshot is ever partially applied
//! across frames.

use super::protocol::{PlayerState, StateSnapshot};

/// The closed set of participant kinds a mirror can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKind {
    RogueWarrior,
    Mage,
    /// Placeholder used until real identity data arrives, and for any
    /// label outside the known roster.
    Dummy,
}

impl PlayerKind {
    /// Map a snapshot identity label onto a kind.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Rogue Warrior" => PlayerKind::RogueWarrior,
            "Mage" => PlayerKind::Mage,
            _ => PlayerKind::Dummy,
        }
    }

    /// Whether this kind has a shield animation. The mage has none; it
    /// fights with projectiles.
    pub fn supports_shield(&self) -> bool {
        matches!(self, PlayerKind::RogueWarrior)
    }
}

/// Animation/display mode derived from the snapshot flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Attacking,
    Gesturing,
    Blocking,
    Moving,
    Idle,
}

impl DisplayMode {
    /// Resolve simultaneously-true flags in fixed priority order:
    /// attacking > gesturing > blocking (if the kind has a shield) >
    /// moving > idle.
    pub fn derive(kind: PlayerKind, state: &PlayerState) -> Self {
        if state.is_attacking {
            DisplayMode::Attacking
        } else if state.is_gesturing {
            DisplayMode::Gesturing
        } else if state.is_blocking && kind.supports_shield() {
            DisplayMode::Blocking
        } else if state.is_moving {
            DisplayMode::Moving
        } else {
            DisplayMode::Idle
        }
    }
}

/// Client-local stand-in for a remote participant. Owned exclusively by
/// the reconciliation loop; rendering only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct Mirror {
    pub kind: PlayerKind,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub max_health: f32,
    pub is_dead: bool,
    pub facing: String,
    pub mode: DisplayMode,
    pub attack_dir_x: f32,
    pub attack_dir_y: f32,
    pub attack_origin_x: f32,
    pub attack_origin_y: f32,
    pub shield_angle: f32,
    pub mouse_world_x: f32,
    pub mouse_world_y: f32,
    pub critical_hit_timer: f32,
    pub critical_border_timer: f32,
    pub critical_text_world_x: f32,
    pub critical_text_world_y: f32,
    pub critical_text_offset_y: f32,
    pub shield_block_timer: f32,
    pub shield_text_world_x: f32,
    pub shield_text_world_y: f32,
    pub shield_text_offset_y: f32,
    pub ui_color: [u8; 3],
}

impl Mirror {
    /// A fresh mirror of the given kind at a position, with everything
    /// else at rest.
    pub fn new(kind: PlayerKind, name: &str, x: f32, y: f32) -> Self {
        Self {
            kind,
            name: name.to_string(),
            x,
            y,
            health: 0.0,
            max_health: 0.0,
            is_dead: false,
            facing: "down".to_string(),
            mode: DisplayMode::Idle,
            attack_dir_x: 0.0,
            attack_dir_y: 0.0,
            attack_origin_x: 0.0,
            attack_origin_y: 0.0,
            shield_angle: 0.0,
            mouse_world_x: 0.0,
            mouse_world_y: 0.0,
            critical_hit_timer: 0.0,
            critical_border_timer: 0.0,
            critical_text_world_x: 0.0,
            critical_text_world_y: 0.0,
            critical_text_offset_y: 0.0,
            shield_block_timer: 0.0,
            shield_text_world_x: 0.0,
            shield_text_world_y: 0.0,
            shield_text_offset_y: 0.0,
            ui_color: [0, 0, 0],
        }
    }

    /// A placeholder mirror used before any identity data has arrived.
    pub fn placeholder(x: f32, y: f32) -> Self {
        Self::new(PlayerKind::Dummy, "Dummy", x, y)
    }
}

/// Client-local stand-in for a transient projectile. The list is rebuilt
/// wholesale each snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileMirror {
    pub x: f32,
    pub y: f32,
    pub dir_x: f32,
    pub dir_y: f32,
    /// Index into the participant mirror list. An unresolved or empty
    /// owner falls back to the second participant, the usual shooter.
    pub owner_slot: usize,
}

/// Discard the mirror and build a fresh one if the incoming label maps
/// to a different kind; otherwise keep it as-is.
pub fn rebuild_if_kind_changed(mirror: Mirror, label: &str, x: f32, y: f32) -> Mirror {
    let kind = PlayerKind::from_label(label);
    if kind == mirror.kind {
        mirror
    } else {
        Mirror::new(kind, label, x, y)
    }
}

fn apply_player_state(mirror: &mut Mirror, state: &PlayerState) {
    mirror.name = state.name.clone();
    mirror.x = state.x;
    mirror.y = state.y;
    mirror.health = state.health;
    mirror.max_health = state.max_health;
    mirror.is_dead = state.health <= 0.0;
    mirror.facing = state.facing.clone();
    mirror.mode = DisplayMode::derive(mirror.kind, state);
    mirror.attack_dir_x = state.attack_dir_x;
    mirror.attack_dir_y = state.attack_dir_y;
    mirror.attack_origin_x = state.attack_origin_x;
    mirror.attack_origin_y = state.attack_origin_y;
    mirror.shield_angle = state.shield_angle;
    mirror.mouse_world_x = state.mouse_world_x;
    mirror.mouse_world_y = state.mouse_world_y;
    mirror.critical_hit_timer = state.critical_hit_timer;
    mirror.critical_border_timer = state.critical_border_timer;
    mirror.critical_text_world_x = state.critical_text_world_x;
    mirror.critical_text_world_y = state.critical_text_world_y;
    mirror.critical_text_offset_y = state.critical_text_offset_y;
    mirror.shield_block_timer = state.shield_block_timer;
    mirror.shield_text_world_x = state.shield_text_world_x;
    mirror.shield_text_world_y = state.shield_text_world_y;
    mirror.shield_text_offset_y = state.shield_text_offset_y;
    mirror.ui_color = state.ui_color;
}

/// Apply one snapshot to the participant mirrors and rebuild the
/// projectile mirrors.
///
/// Slots beyond the snapshot's participant list keep their previous
/// mirror (a momentarily missing record degrades to last known state).
/// Applying the same snapshot twice yields the same mirrors as applying
/// it once.
pub fn reconcile(
    mut mirrors: Vec<Mirror>,
    snapshot: &StateSnapshot,
) -> (Vec<Mirror>, Vec<ProjectileMirror>) {
    for (slot, state) in snapshot.players.iter().enumerate() {
        let mirror = match mirrors.get(slot) {
            Some(existing) => {
                rebuild_if_kind_changed(existing.clone(), &state.name, state.x, state.y)
            }
            None => Mirror::new(
                PlayerKind::from_label(&state.name),
                &state.name,
                state.x,
                state.y,
            ),
        };

        let mut mirror = mirror;
        apply_player_state(&mut mirror, state);

        if slot < mirrors.len() {
            mirrors[slot] = mirror;
        } else {
            mirrors.push(mirror);
        }
    }

    let projectiles = snapshot
        .projectiles
        .iter()
        .map(|p| ProjectileMirror {
            x: p.x,
            y: p.y,
            dir_x: p.dir_x,
            dir_y: p.dir_y,
            owner_slot: mirrors
                .iter()
                .position(|m| m.name == p.owner)
                .unwrap_or(1),
        })
        .collect();

    (mirrors, projectiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netplay::protocol::{CameraState, ProjectileState};

    fn player(name: &str, x: f32, y: f32) -> PlayerState {
        PlayerState {
            name: name.to_string(),
            x,
            y,
            health: 10.0,
            max_health: 10.0,
            facing: "down".to_string(),
            is_attacking: false,
            is_blocking: false,
            is_gesturing: false,
            is_moving: false,
            attack_dir_x: 0.0,
            attack_dir_y: 0.0,
            attack_origin_x: 0.0,
            attack_origin_y: 0.0,
            shield_angle: 0.0,
            mouse_world_x: 0.0,
            mouse_world_y: 0.0,
            critical_hit_timer: 0.0,
            critical_border_timer: 0.0,
            critical_text_world_x: 0.0,
            critical_text_world_y: 0.0,
            critical_text_offset_y: 0.0,
            shield_block_timer: 0.0,
            shield_text_world_x: 0.0,
            shield_text_world_y: 0.0,
            shield_text_offset_y: 0.0,
            ui_color: [0, 200, 0],
        }
    }

    fn snapshot(players: Vec<PlayerState>, projectiles: Vec<ProjectileState>) -> StateSnapshot {
        StateSnapshot {
            game_state: "playing".to_string(),
            last_winner: None,
            camera: CameraState::default(),
            players,
            projectiles,
        }
    }

    fn starting_mirrors() -> Vec<Mirror> {
        vec![
            Mirror::new(PlayerKind::RogueWarrior, "Rogue Warrior", -200.0, 0.0),
            Mirror::new(PlayerKind::Mage, "Mage", 200.0, 0.0),
        ]
    }

    #[test]
    fn test_scalar_fields_are_copied() {
        let mut p = player("Rogue Warrior", 10.0, 5.0);
        p.health = 8.0;
        p.facing = "left".to_string();
        let snap = snapshot(vec![p, player("Mage", 30.0, 0.0)], vec![]);

        let (mirrors, _) = reconcile(starting_mirrors(), &snap);
        assert_eq!(mirrors[0].x, 10.0);
        assert_eq!(mirrors[0].y, 5.0);
        assert_eq!(mirrors[0].health, 8.0);
        assert_eq!(mirrors[0].facing, "left");
        assert!(!mirrors[0].is_dead);
    }

    #[test]
    fn test_identity_swap_rebuilds_the_mirror() {
        // Slot 1 starts as a Mage; the remote swapped to a Rogue Warrior.
        let snap = snapshot(
            vec![
                player("Rogue Warrior", -200.0, 0.0),
                player("Rogue Warrior", 42.0, 7.0),
            ],
            vec![],
        );

        let (mirrors, _) = reconcile(starting_mirrors(), &snap);
        assert_eq!(mirrors[1].kind, PlayerKind::RogueWarrior);
        assert_eq!(mirrors[1].x, 42.0);
        assert_eq!(mirrors[1].y, 7.0);
    }

    #[test]
    fn test_unknown_label_becomes_placeholder_kind() {
        let snap = snapshot(
            vec![player("???", 0.0, 0.0), player("Mage", 0.0, 0.0)],
            vec![],
        );
        let (mirrors, _) = reconcile(starting_mirrors(), &snap);
        assert_eq!(mirrors[0].kind, PlayerKind::Dummy);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut p = player("Mage", 3.0, 4.0);
        p.is_moving = true;
        let snap = snapshot(
            vec![player("Rogue Warrior", 1.0, 2.0), p],
            vec![ProjectileState {
                x: 9.0,
                y: 9.0,
                dir_x: 1.0,
                dir_y: 0.0,
                owner: "Mage".to_string(),
            }],
        );

        let once = reconcile(starting_mirrors(), &snap);
        let twice = reconcile(once.0.clone(), &snap);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_attack_wins_over_moving() {
        let mut p = player("Rogue Warrior", 0.0, 0.0);
        p.is_attacking = true;
        p.is_moving = true;
        let snap = snapshot(vec![p, player("Mage", 0.0, 0.0)], vec![]);

        let (mirrors, _) = reconcile(starting_mirrors(), &snap);
        assert_eq!(mirrors[0].mode, DisplayMode::Attacking);
    }

    #[test]
    fn test_priority_order_is_fixed() {
        let mut all = player("Rogue Warrior", 0.0, 0.0);
        all.is_attacking = true;
        all.is_gesturing = true;
        all.is_blocking = true;
        all.is_moving = true;
        assert_eq!(
            DisplayMode::derive(PlayerKind::RogueWarrior, &all),
            DisplayMode::Attacking
        );

        all.is_attacking = false;
        assert_eq!(
            DisplayMode::derive(PlayerKind::RogueWarrior, &all),
            DisplayMode::Gesturing
        );

        all.is_gesturing = false;
        assert_eq!(
            DisplayMode::derive(PlayerKind::RogueWarrior, &all),
            DisplayMode::Blocking
        );
        // The mage has no shield animation, so blocking falls through.
        assert_eq!(DisplayMode::derive(PlayerKind::Mage, &all), DisplayMode::Moving);

        all.is_blocking = false;
        all.is_moving = false;
        assert_eq!(
            DisplayMode::derive(PlayerKind::RogueWarrior, &all),
            DisplayMode::Idle
        );
    }

    #[test]
    fn test_projectiles_rebuilt_wholesale_with_owner_resolution() {
        let snap = snapshot(
            vec![player("Rogue Warrior", 0.0, 0.0), player("Mage", 0.0, 0.0)],
            vec![
                ProjectileState {
                    x: 1.0,
                    y: 1.0,
                    dir_x: 1.0,
                    dir_y: 0.0,
                    owner: "Mage".to_string(),
                },
                ProjectileState {
                    x: 2.0,
                    y: 2.0,
                    dir_x: 0.0,
                    dir_y: 1.0,
                    owner: "nobody".to_string(),
                },
            ],
        );

        let (_, projectiles) = reconcile(starting_mirrors(), &snap);
        assert_eq!(projectiles.len(), 2);
        assert_eq!(projectiles[0].owner_slot, 1);
        assert_eq!(projectiles[1].owner_slot, 1);

        // A later snapshot with no projectiles empties the list.
        let empty = snapshot(
            vec![player("Rogue Warrior", 0.0, 0.0), player("Mage", 0.0, 0.0)],
            vec![],
        );
        let (_, projectiles) = reconcile(starting_mirrors(), &empty);
        assert!(projectiles.is_empty());
    }

    #[test]
    fn test_unowned_projectile_resolves_to_second_slot() {
        let snap = snapshot(
            vec![player("Rogue Warrior", 0.0, 0.0), player("Mage", 0.0, 0.0)],
            vec![ProjectileState {
                x: 0.0,
                y: 0.0,
                dir_x: 1.0,
                dir_y: 0.0,
                owner: String::new(),
            }],
        );

        let (_, projectiles) = reconcile(starting_mirrors(), &snap);
        assert_eq!(projectiles[0].owner_slot, 1);
    }

    #[test]
    fn test_missing_slot_keeps_previous_mirror() {
        let snap = snapshot(vec![player("Rogue Warrior", 5.0, 5.0)], vec![]);
        let before = starting_mirrors();
        let expected_mage = before[1].clone();

        let (mirrors, _) = reconcile(before, &snap);
        assert_eq!(mirrors.len(), 2);
        assert_eq!(mirrors[1], expected_mage);
    }

    #[test]
    fn test_dead_flag_follows_health() {
        let mut p = player("Mage", 0.0, 0.0);
        p.health = 0.0;
        let snap = snapshot(vec![player("Rogue Warrior", 0.0, 0.0), p], vec![]);
        let (mirrors, _) = reconcile(starting_mirrors(), &snap);
        assert!(mirrors[1].is_dead);
    }
}
