use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    ManageEvents,
    ViewAttendees,
    CheckInAttendees,
    ViewSubscribers,
    ManageTrackingLinks,
    ViewAnalytics,
    ManageUsers,
}

impl Permission {
    pub fn as_int(self) -> i32 {
        match self {
            Permission::ManageEvents => 1,
            Permission::ViewAttendees => 2,
            Permission::CheckInAttendees => 3,
            Permission::ViewSubscribers => 4,
            Permission::ManageTrackingLinks => 5,
            Permission::ViewAnalytics => 6,
            Permission::ManageUsers => 7,
        }
    }

    pub fn from_int(value: i32) -> Option<Self> {
        match value {
            1 => Some(Permission::ManageEvents),
            2 => Some(Permission::ViewAttendees),
            3 => Some(Permission::CheckInAttendees),
            4 => Some(Permission::ViewSubscribers),
            5 => Some(Permission::ManageTrackingLinks),
            6 => Some(Permission::ViewAnalytics),
            7 => Some(Permission::ManageUsers),
            _ => None,
        }
    }
}

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ManageEvents,
    Permission::ViewAttendees,
    Permission::CheckInAttendees,
    Permission::ViewSubscribers,
    Permission::ManageTrackingLinks,
    Permission::ViewAnalytics,
    Permission::ManageUsers,
];
/// Door volunteers: enough to run the check-in table.
const ORGANIZER_PERMISSIONS: &[Permission] =
    &[Permission::ViewAttendees, Permission::CheckInAttendees];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    Admin,
    Organizer,
}

impl UserRole {
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            UserRole::Admin => ADMIN_PERMISSIONS,
            UserRole::Organizer => ORGANIZER_PERMISSIONS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "Admin",
            UserRole::Organizer => "Organizer",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(UserRole::Admin),
            "organizer" => Some(UserRole::Organizer),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
