use base64::{Engine, engine::general_purpose};
use hmac::{Hmac, Mac};
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Base64 HMAC-SHA256 of the password, keyed with `salt`.
    pub password_hash: String,
    pub salt: String,
    #[serde(default)]
    pub is_staff: bool,
}

fn password_mac(salt: &str, password: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(salt.as_bytes()).ok()?;
    mac.update(password.as_bytes());
    Some(mac)
}

impl User {
    pub fn with_password(password: &str, is_staff: bool) -> Self {
        let mut user = Self {
            password_hash: String::new(),
            salt: String::new(),
            is_staff,
        };
        user.set_password(password);
        user
    }

    /// Replace the password, drawing a fresh salt.
    pub fn set_password(&mut self, password: &str) {
        self.salt = general_purpose::STANDARD.encode(rng().random::<[u8; 16]>());
        self.password_hash = password_mac(&self.salt, password)
            .map(|mac| general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
            .unwrap_or_default();
    }

    pub fn verify_password(&self, password: &str) -> bool {
        let Ok(expected) = general_purpose::STANDARD.decode(&self.password_hash) else {
            return false;
        };
        password_mac(&self.salt, password).is_some_and(|mac| mac.verify_slice(&expected).is_ok())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserDatabase {
    #[serde(default)]
    pub users: BTreeMap<String, User>,
}

/// Usernames are matched case-insensitively.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

impl UserDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let contents = fs::read_to_string(path).await?;
        let doc = contents
            .parse::<toml_edit::DocumentMut>()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let db: UserDatabase = toml_edit::de::from_document(doc)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(db)
    }

    /// Load the database, or start empty when the file does not exist yet.
    pub async fn load_or_default(path: &Path) -> Result<Self, std::io::Error> {
        match Self::load_from_file(path).await {
            Ok(db) => Ok(db),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e),
        }
    }

    pub async fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        let value = toml_edit::ser::to_document(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(path, value.to_string()).await?;
        Ok(())
    }

    pub fn get_user(&self, username: &str) -> Option<&User> {
        self.users.get(&normalize_username(username))
    }

    pub fn get_user_mut(&mut self, username: &str) -> Option<&mut User> {
        self.users.get_mut(&normalize_username(username))
    }

    pub fn add_user(&mut self, username: &str, user: User) {
        self.users.insert(normalize_username(username), user);
    }

    pub fn remove_user(&mut self, username: &str) -> Option<User> {
        self.users.remove(&normalize_username(username))
    }

    /// The user named `username` if `password` matches.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<&User> {
        self.get_user(username)
            .filter(|user| user.verify_password(password))
    }

    pub fn is_staff(&self, username: &str) -> bool {
        self.get_user(username).is_some_and(|user| user.is_staff)
    }
}
