// User models: traders, mentors and the mock account directory

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Trader,
    Mentor,
}

/// The authenticated user record stored in the session slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    /// Trader ids this mentor may review
    #[serde(default)]
    pub mentees: Vec<String>,
}

impl User {
    pub fn is_mentor(&self) -> bool {
        self.role == UserRole::Mentor
    }

    /// Traders see only their own analytics; mentors also see their mentees'
    pub fn can_view(&self, trader_id: &str) -> bool {
        self.id == trader_id || (self.is_mentor() && self.mentees.iter().any(|m| m == trader_id))
    }
}

struct Account {
    user: User,
    password: &'static str,
}

/// Fixed in-memory account list; there is no real authentication server
pub struct UserDirectory {
    accounts: Vec<Account>,
}

impl UserDirectory {
    pub fn mock() -> Self {
        let trader = |id: &str, name: &str, email: &str| User {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            role: UserRole::Trader,
            mentees: Vec::new(),
        };
        Self {
            accounts: vec![
                Account {
                    user: trader("u1", "Alex Trader", "trader@journal.local"),
                    password: "trader123",
                },
                Account {
                    user: trader("u2", "Sam Swing", "swing@journal.local"),
                    password: "swing123",
                },
                Account {
                    user: User {
                        id: "m1".to_string(),
                        name: "Morgan Mentor".to_string(),
                        email: "mentor@journal.local".to_string(),
                        role: UserRole::Mentor,
                        mentees: vec!["u1".to_string(), "u2".to_string()],
                    },
                    password: "mentor123",
                },
            ],
        }
    }

    /// Email is matched case-insensitively
    pub fn authenticate(&self, email: &str, password: &str) -> Option<User> {
        self.accounts
            .iter()
            .find(|a| a.user.email.eq_ignore_ascii_case(email.trim()) && a.password == password)
            .map(|a| a.user.clone())
    }

    pub fn find(&self, id: &str) -> Option<&User> {
        self.accounts.iter().map(|a| &a.user).find(|u| u.id == id)
    }

    pub fn mentees_of(&self, mentor: &User) -> Vec<&User> {
        mentor.mentees.iter().filter_map(|id| self.find(id)).collect()
    }
}
