use std::fmt;

/// Preference key under which a recipient opts into a kind of notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationCategory {
    /// Activity concerning the recipient's own account
    MyAccount,
    /// Offers published in the group
    NewOffers,
    /// Needs published in the group
    NewNeeds,
    /// Members joining the group
    NewMembers,
}

impl NotificationCategory {
    /// Settings key of the category
    pub fn key(&self) -> &'static str {
        match self {
            NotificationCategory::MyAccount => "myAccount",
            NotificationCategory::NewOffers => "newOffers",
            NotificationCategory::NewNeeds => "newNeeds",
            NotificationCategory::NewMembers => "newMembers",
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
