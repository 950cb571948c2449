use std::fmt::Write;

use ed25519_dalek::SigningKey;
use parley_core::{NewFileMessage, NewMessage};
use rand::rngs::OsRng;

/// A chat contact with a real public key.
pub struct TestPeer {
    pub name: String,
    pub public_key: String,
}

impl TestPeer {
    pub fn new(name: &str) -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public_key = signing_key
            .verifying_key()
            .as_bytes()
            .iter()
            .fold(String::with_capacity(64), |mut hex, byte| {
                let _ = write!(hex, "{byte:02X}");
                hex
            });
        Self {
            name: name.to_owned(),
            public_key,
        }
    }

    pub fn key(&self) -> &str {
        &self.public_key
    }

    /// A message this peer sent to us in their own chat.
    pub fn incoming<'a>(&'a self, text: &'a str, timestamp: i64) -> NewMessage<'a> {
        NewMessage {
            peer_key: &self.public_key,
            text,
            sender_key: &self.public_key,
            timestamp,
            is_sent: true,
            display_name: &self.name,
        }
    }

    /// A message `me` sent into this peer's chat.
    pub fn outgoing<'a>(&'a self, me: &'a TestPeer, text: &'a str, timestamp: i64, is_sent: bool) -> NewMessage<'a> {
        NewMessage {
            peer_key: &self.public_key,
            text,
            sender_key: &me.public_key,
            timestamp,
            is_sent,
            display_name: &me.name,
        }
    }

    /// A file this peer offers us.
    pub fn incoming_file<'a>(
        &'a self,
        file_id: &'a str,
        file_name: &'a str,
        file_size: i64,
        timestamp: i64,
    ) -> NewFileMessage<'a> {
        NewFileMessage {
            peer_key: &self.public_key,
            file_id,
            file_name,
            file_path: "",
            file_size,
            sender_key: &self.public_key,
            timestamp,
            display_name: &self.name,
        }
    }
}

/// Transport-style file identifier.
pub fn new_file_id() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peers_have_distinct_hex_keys() {
        let a = TestPeer::new("a");
        let b = TestPeer::new("b");
        assert_eq!(a.key().len(), 64);
        assert!(a.key().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn file_ids_are_unique() {
        assert_ne!(new_file_id(), new_file_id());
    }
}
