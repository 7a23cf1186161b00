//! Closed set of fixture tags used to classify contacts and bodies.
//!
//! Every fixture the game creates carries one `FixtureTag`. Contact rules match
//! on pairs of tags exhaustively; a fixture without a tag simply matches no rule.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Team {
    Blue,
    Red,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::Blue, Team::Red];

    pub fn opponent(self) -> Self {
        match self {
            Team::Blue => Team::Red,
            Team::Red => Team::Blue,
        }
    }

    /// Stable index for per-team arrays.
    pub fn index(self) -> usize {
        match self {
            Team::Blue => 0,
            Team::Red => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Team::Blue => "blue",
            Team::Red => "red",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which part of a character a fixture belongs to. The bottom circle is the
/// foot that lands and rolls; the top box is the torso.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterPart {
    Bottom,
    Top,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixtureTag {
    Ground,
    Character { team: Team, part: CharacterPart },
    Arm { team: Team },
    Projectile { team: Team },
}

impl FixtureTag {
    pub fn role(self) -> BodyRole {
        match self {
            FixtureTag::Ground => BodyRole::Ground,
            FixtureTag::Character { team, .. } => BodyRole::Character(team),
            FixtureTag::Arm { team } => BodyRole::Arm(team),
            FixtureTag::Projectile { team } => BodyRole::Projectile(team),
        }
    }

    pub fn team(self) -> Option<Team> {
        self.role().team()
    }

    pub fn is_bottom(self) -> bool {
        matches!(
            self,
            FixtureTag::Character {
                part: CharacterPart::Bottom,
                ..
            }
        )
    }
}

/// Body-level projection of a fixture tag. A body's role is the role of its
/// first tagged fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyRole {
    Ground,
    Character(Team),
    Arm(Team),
    Projectile(Team),
}

impl BodyRole {
    pub fn team(self) -> Option<Team> {
        match self {
            BodyRole::Ground => None,
            BodyRole::Character(team) | BodyRole::Arm(team) | BodyRole::Projectile(team) => {
                Some(team)
            }
        }
    }

    pub fn is_character(self) -> bool {
        matches!(self, BodyRole::Character(_))
    }

    pub fn is_projectile(self) -> bool {
        matches!(self, BodyRole::Projectile(_))
    }
}
