use std::fmt;

pub const SONGS_READ: &str = "songs:read";
pub const SONGS_WRITE: &str = "songs:write";

/// The permission codes granted to one user, as read from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(Vec<String>);

impl Permissions {
    #[must_use]
    pub fn new(codes: Vec<String>) -> Self {
        Self(codes)
    }

    #[must_use]
    pub fn includes(&self, code: &str) -> bool {
        self.0.iter().any(|granted| granted == code)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for Permissions {
    fn from(codes: Vec<String>) -> Self {
        Self::new(codes)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::{Permissions, SONGS_READ, SONGS_WRITE};

    #[test]
    fn includes_granted_codes_only() {
        let permissions = Permissions::new(vec![SONGS_READ.to_owned()]);
        assert!(permissions.includes(SONGS_READ));
        assert!(!permissions.includes(SONGS_WRITE));
    }

    #[test]
    fn empty_grant_set_includes_nothing() {
        let permissions = Permissions::default();
        assert!(permissions.is_empty());
        assert!(!permissions.includes(SONGS_READ));
    }
}
