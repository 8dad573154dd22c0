use keycard_core::{Identifier, Role};
use serde::Serialize;

/// In-memory view of the persisted credentials.
///
/// Invariant: `master` never appears in `authorized`, and `authorized`
/// holds no duplicates. Every constructor and mutator keeps it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Credentials {
    master: Option<Identifier>,
    authorized: Vec<Identifier>,
}

impl Credentials {
    /// Build credentials from loaded records, dropping entries that would
    /// break the invariant.
    pub fn from_records(master: Option<Identifier>, records: Vec<Identifier>) -> Self {
        let mut credentials = Self {
            master,
            authorized: Vec::with_capacity(records.len()),
        };
        for id in records {
            credentials.insert_authorized(id);
        }
        credentials
    }

    pub fn master(&self) -> Option<&Identifier> {
        self.master.as_ref()
    }

    pub fn authorized(&self) -> &[Identifier] {
        &self.authorized
    }

    pub fn has_master(&self) -> bool {
        self.master.is_some()
    }

    pub fn is_master(&self, id: &Identifier) -> bool {
        self.master.as_ref() == Some(id)
    }

    /// Resolve the role of `id`; the master check takes precedence.
    pub fn role_of(&self, id: &Identifier) -> Role {
        if self.is_master(id) {
            Role::Master
        } else if self.authorized.contains(id) {
            Role::Authorized
        } else {
            Role::Unknown
        }
    }

    /// Replace the master and revoke every prior grant.
    pub fn replace_master(&mut self, id: Identifier) {
        self.master = Some(id);
        self.authorized.clear();
    }

    /// Insert `id` into the authorized set.
    ///
    /// Returns `true` if the id was already present (as master or grant),
    /// in which case nothing changes.
    pub fn insert_authorized(&mut self, id: Identifier) -> bool {
        if self.role_of(&id) != Role::Unknown {
            return true;
        }
        self.authorized.push(id);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    #[test]
    fn test_master_precedence() {
        let creds = Credentials::from_records(Some(id("MASTER01")), vec![]);
        assert_eq!(creds.role_of(&id("master01")), Role::Master);
        assert_eq!(creds.role_of(&id("USER0001")), Role::Unknown);
    }

    #[test]
    fn test_from_records_drops_master_and_duplicates() {
        let creds = Credentials::from_records(
            Some(id("MASTER01")),
            vec![id("USER0001"), id("MASTER01"), id("user0001"), id("USER0002")],
        );
        assert_eq!(creds.authorized(), &[id("USER0001"), id("USER0002")]);
    }

    #[test]
    fn test_insert_authorized_polarity() {
        let mut creds = Credentials::from_records(Some(id("MASTER01")), vec![]);
        assert!(!creds.insert_authorized(id("USER0001")));
        assert!(creds.insert_authorized(id("USER0001")));
        assert!(creds.insert_authorized(id("MASTER01")));
        assert_eq!(creds.authorized().len(), 1);
    }

    #[test]
    fn test_replace_master_clears_authorized() {
        let mut creds =
            Credentials::from_records(Some(id("MASTER01")), vec![id("A1"), id("A2"), id("A3")]);
        creds.replace_master(id("NEWMASTER"));
        assert!(creds.authorized().is_empty());
        assert_eq!(creds.role_of(&id("A1")), Role::Unknown);
        assert_eq!(creds.role_of(&id("MASTER01")), Role::Unknown);
    }
}
