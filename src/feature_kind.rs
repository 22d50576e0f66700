use std::fmt;
use std::str::FromStr;

macro_rules! feature_kinds {
    ( $( $variant:ident => $name:literal ),* $(,)? ) => {
        /// Closed set of stat categories a feature can belong to.
        ///
        /// The primitive type of a feature is decided by the literal in the feature file,
        /// not by its kind.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum FeatureKind {
            $( $variant ),*
        }

        impl FeatureKind {
            pub const ALL: &'static [FeatureKind] = &[ $( FeatureKind::$variant ),* ];

            /// Name as written on the left of `=` in a feature file.
            pub fn name(&self) -> &'static str {
                match self {
                    $( FeatureKind::$variant => $name ),*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $name => Some(FeatureKind::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

feature_kinds! {
    Health => "health",
    MaxHealth => "maxHealth",
    Shield => "shield",
    Armor => "armor",
    Speed => "speed",
    SprintSpeed => "sprintSpeed",
    JumpForce => "jumpForce",
    DashCooldown => "dashCooldown",
    FireRate => "fireRate",
    MagSize => "magSize",
    Ammo => "ammo",
    ReloadTime => "reloadTime",
    Damage => "damage",
    CritChance => "critChance",
    CritMultiplier => "critMultiplier",
    BulletSpeed => "bulletSpeed",
    BulletSpread => "bulletSpread",
    ProjectileCount => "projectileCount",
    IsAutomatic => "isAutomatic",
    Heat => "heat",
    HeatPerShot => "heatPerShot",
    HeatDissipation => "heatDissipation",
    OverheatThreshold => "overheatThreshold",
    RecoilVertical => "recoilVertical",
    RecoilHorizontal => "recoilHorizontal",
    RecoilRecovery => "recoilRecovery",
    PickupRange => "pickupRange",
    Invulnerable => "invulnerable",
    Money => "money",
    Keys => "keys",
    AstroCredits => "astroCredits",
}

impl FeatureKind {
    /// Kinds that are seeded programmatically and never read from a feature file.
    pub fn is_reserved(&self) -> bool {
        matches!(self, FeatureKind::Money | FeatureKind::Keys)
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureKind::from_name(s).ok_or_else(|| format!("unknown feature kind '{}'", s))
    }
}
