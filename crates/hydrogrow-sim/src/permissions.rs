//! Role-based permissions for shared containers.
//!
//! Roles map to fixed permission presets. A player's permission set is
//! always recomputed wholesale from the role, never edited field by field.
//!
//! | Role    | plant | harvest | env | nutrients | equip | buy | sell | manage | kick |
//! |---------|-------|---------|-----|-----------|-------|-----|------|--------|------|
//! | Owner   | ✓ | ✓ | ✓ | ✓ | ✓ | ✓ | ✓ | ✓ | ✓ |
//! | Manager | ✓ | ✓ | ✓ | ✓ | ✓ | ✓ | ✓ | ✗ | ✗ |
//! | Helper  | ✓ | ✓ | ✗ | ✓ | ✗ | ✗ | ✗ | ✗ | ✗ |
//! | Visitor | ✗ | ✗ | ✗ | ✗ | ✗ | ✗ | ✗ | ✗ | ✗ |
//!
//! The owner of a container always passes checks against it; a container
//! that is not shared denies everyone else.

use hydrogrow_common::PlayerId;
use serde::{Deserialize, Serialize};

/// Session role of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlayerRole {
    /// Session owner, full control
    Owner,
    /// Trusted co-gardener
    Manager,
    /// Can plant, harvest and feed
    Helper,
    /// Read-only
    #[default]
    Visitor,
}

impl PlayerRole {
    /// Get the display name of this role.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Manager => "Manager",
            Self::Helper => "Helper",
            Self::Visitor => "Visitor",
        }
    }

    /// Permission preset of this role.
    #[must_use]
    pub fn permissions(self) -> PlayerPermissions {
        PlayerPermissions::for_role(self)
    }
}

/// Capability flags derived from a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PlayerPermissions {
    /// Plant seeds and tend plants
    pub can_plant: bool,
    /// Harvest and remove plants
    pub can_harvest: bool,
    /// Change pH, EC and water level
    pub can_adjust_environment: bool,
    /// Add nutrients to a solution or plant
    pub can_add_nutrients: bool,
    /// Start and stop pumps
    pub can_operate_equipment: bool,
    /// Buy from the shop
    pub can_purchase: bool,
    /// Sell produce
    pub can_sell: bool,
    /// Change other players' roles
    pub can_manage_permissions: bool,
    /// Remove players from the session
    pub can_kick: bool,
}

impl PlayerPermissions {
    /// Every permission granted.
    pub const ALL: Self = Self {
        can_plant: true,
        can_harvest: true,
        can_adjust_environment: true,
        can_add_nutrients: true,
        can_operate_equipment: true,
        can_purchase: true,
        can_sell: true,
        can_manage_permissions: true,
        can_kick: true,
    };

    /// No permission granted.
    pub const NONE: Self = Self {
        can_plant: false,
        can_harvest: false,
        can_adjust_environment: false,
        can_add_nutrients: false,
        can_operate_equipment: false,
        can_purchase: false,
        can_sell: false,
        can_manage_permissions: false,
        can_kick: false,
    };

    /// The preset for `role`.
    #[must_use]
    pub const fn for_role(role: PlayerRole) -> Self {
        match role {
            PlayerRole::Owner => Self::ALL,
            PlayerRole::Manager => Self {
                can_manage_permissions: false,
                can_kick: false,
                ..Self::ALL
            },
            PlayerRole::Helper => Self {
                can_plant: true,
                can_harvest: true,
                can_add_nutrients: true,
                ..Self::NONE
            },
            PlayerRole::Visitor => Self::NONE,
        }
    }

    /// Whether this set grants `action`.
    #[must_use]
    pub const fn allows(&self, action: NetworkAction) -> bool {
        match action {
            NetworkAction::PlantSeed | NetworkAction::WaterPlant => self.can_plant,
            NetworkAction::Harvest | NetworkAction::RemovePlant => self.can_harvest,
            NetworkAction::AdjustEnvironment => self.can_adjust_environment,
            NetworkAction::AddNutrients | NetworkAction::ApplyPlantNutrients => {
                self.can_add_nutrients
            }
            NetworkAction::OperateEquipment => self.can_operate_equipment,
            NetworkAction::Purchase => self.can_purchase,
            NetworkAction::Sell => self.can_sell,
            NetworkAction::ManagePermissions => self.can_manage_permissions,
            NetworkAction::KickPlayer => self.can_kick,
        }
    }
}

/// Kinds of player action subject to a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkAction {
    /// Plant a seed
    PlantSeed,
    /// Harvest a ready plant
    Harvest,
    /// Remove a plant without harvesting
    RemovePlant,
    /// Water a plant
    WaterPlant,
    /// Feed a plant directly
    ApplyPlantNutrients,
    /// Change pH, EC or water level
    AdjustEnvironment,
    /// Top up a nutrient solution
    AddNutrients,
    /// Start or stop a pump
    OperateEquipment,
    /// Buy from the shop
    Purchase,
    /// Sell produce
    Sell,
    /// Change another player's role
    ManagePermissions,
    /// Kick a player
    KickPlayer,
}

impl NetworkAction {
    /// Get the display name of this action.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::PlantSeed => "plant seeds",
            Self::Harvest => "harvest",
            Self::RemovePlant => "remove plants",
            Self::WaterPlant => "water plants",
            Self::ApplyPlantNutrients => "feed plants",
            Self::AdjustEnvironment => "adjust the environment",
            Self::AddNutrients => "add nutrients",
            Self::OperateEquipment => "operate equipment",
            Self::Purchase => "purchase",
            Self::Sell => "sell",
            Self::ManagePermissions => "manage permissions",
            Self::KickPlayer => "kick players",
        }
    }

    /// Whether the action targets a container and its plants.
    #[must_use]
    pub fn targets_container(self) -> bool {
        !matches!(
            self,
            Self::Purchase | Self::Sell | Self::ManagePermissions | Self::KickPlayer
        )
    }
}

/// Ownership facts of the container an action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerAccess {
    /// Container owner
    pub owner: PlayerId,
    /// Whether non-owners may act on it
    pub shared: bool,
}

/// Why a check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenialReason {
    /// Player is not in the session
    UnknownPlayer,
    /// Container is private to its owner
    NotShared,
    /// Role lacks the permission
    MissingPermission,
}

impl DenialReason {
    /// Get the display name of this reason.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::UnknownPlayer => "not in session",
            Self::NotShared => "container is not shared",
            Self::MissingPermission => "role lacks permission",
        }
    }
}

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessResult {
    /// Whether the action may proceed
    pub allowed: bool,
    /// Reason for denial (if denied)
    pub denial_reason: Option<DenialReason>,
    /// Whether container ownership granted it regardless of role
    pub is_owner_override: bool,
}

impl AccessResult {
    const fn granted(is_owner_override: bool) -> Self {
        Self {
            allowed: true,
            denial_reason: None,
            is_owner_override,
        }
    }

    const fn denied(reason: DenialReason) -> Self {
        Self {
            allowed: false,
            denial_reason: Some(reason),
            is_owner_override: false,
        }
    }
}

/// Checks whether `player` may perform `action`.
///
/// `permissions` is `None` when the player is not registered.
/// `container` is `None` for actions that do not target a container.
#[must_use]
pub fn check_access(
    player: PlayerId,
    permissions: Option<&PlayerPermissions>,
    action: NetworkAction,
    container: Option<ContainerAccess>,
) -> AccessResult {
    let Some(permissions) = permissions else {
        return AccessResult::denied(DenialReason::UnknownPlayer);
    };

    if let Some(access) = container {
        if access.owner == player {
            return AccessResult::granted(true);
        }
        if !access.shared {
            return AccessResult::denied(DenialReason::NotShared);
        }
    }

    if permissions.allows(action) {
        AccessResult::granted(false)
    } else {
        AccessResult::denied(DenialReason::MissingPermission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: PlayerId = PlayerId::from_raw(1);
    const BOB: PlayerId = PlayerId::from_raw(2);

    const MUTATIONS: [NetworkAction; 4] = [
        NetworkAction::PlantSeed,
        NetworkAction::AdjustEnvironment,
        NetworkAction::AddNutrients,
        NetworkAction::OperateEquipment,
    ];

    fn shared_by(owner: PlayerId) -> Option<ContainerAccess> {
        Some(ContainerAccess {
            owner,
            shared: true,
        })
    }

    #[test]
    fn test_role_table() {
        let manager = PlayerRole::Manager.permissions();
        assert!(manager.can_operate_equipment);
        assert!(manager.can_sell);
        assert!(!manager.can_manage_permissions);
        assert!(!manager.can_kick);

        let helper = PlayerRole::Helper.permissions();
        assert!(helper.can_plant && helper.can_harvest && helper.can_add_nutrients);
        assert!(!helper.can_adjust_environment);
        assert!(!helper.can_operate_equipment);
        assert!(!helper.can_purchase);

        assert_eq!(PlayerRole::Owner.permissions(), PlayerPermissions::ALL);
        assert_eq!(PlayerRole::Visitor.permissions(), PlayerPermissions::NONE);
    }

    #[test]
    fn test_visitor_denied_owner_allowed() {
        let visitor = PlayerRole::Visitor.permissions();
        let owner = PlayerRole::Owner.permissions();
        for action in MUTATIONS {
            let result = check_access(BOB, Some(&visitor), action, shared_by(ALICE));
            assert!(!result.allowed, "{action:?}");
            assert_eq!(result.denial_reason, Some(DenialReason::MissingPermission));

            let result = check_access(BOB, Some(&owner), action, shared_by(ALICE));
            assert!(result.allowed, "{action:?}");
        }
    }

    #[test]
    fn test_container_owner_overrides_role() {
        let visitor = PlayerRole::Visitor.permissions();
        let result = check_access(
            ALICE,
            Some(&visitor),
            NetworkAction::PlantSeed,
            shared_by(ALICE),
        );
        assert!(result.allowed);
        assert!(result.is_owner_override);
    }

    #[test]
    fn test_private_container_denies_others() {
        let owner_role = PlayerRole::Owner.permissions();
        let private = Some(ContainerAccess {
            owner: ALICE,
            shared: false,
        });
        let result = check_access(BOB, Some(&owner_role), NetworkAction::Harvest, private);
        assert_eq!(result.denial_reason, Some(DenialReason::NotShared));
    }

    #[test]
    fn test_unknown_player() {
        let result = check_access(BOB, None, NetworkAction::Harvest, shared_by(BOB));
        assert_eq!(result.denial_reason, Some(DenialReason::UnknownPlayer));
    }

    #[test]
    fn test_session_actions() {
        let helper = PlayerRole::Helper.permissions();
        assert!(!check_access(BOB, Some(&helper), NetworkAction::KickPlayer, None).allowed);
        assert!(!NetworkAction::KickPlayer.targets_container());
        assert!(NetworkAction::WaterPlant.targets_container());
        let owner = PlayerRole::Owner.permissions();
        assert!(check_access(BOB, Some(&owner), NetworkAction::ManagePermissions, None).allowed);
    }
}
