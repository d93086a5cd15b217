//! The fixed three-column row and its on-disk encoding.
//!
//! Layout (293 bytes, no length prefixes):
//! - `id`: 4 bytes, little-endian
//! - `username`: 33 bytes (32 content + NUL terminator), NUL padded
//! - `email`: 256 bytes (255 content + NUL terminator), NUL padded

/// Maximum username length in bytes.
pub const COLUMN_USERNAME_SIZE: usize = 32;

/// Maximum email length in bytes.
pub const COLUMN_EMAIL_SIZE: usize = 255;

pub const ID_SIZE: usize = 4;
pub const USERNAME_SIZE: usize = COLUMN_USERNAME_SIZE + 1;
pub const EMAIL_SIZE: usize = COLUMN_EMAIL_SIZE + 1;

pub const ID_OFFSET: usize = 0;
pub const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
pub const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

/// Serialized row size in bytes.
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

/// A single table row. The `id` is the primary key.
///
/// Constructing a `Row` validates the field byte budgets, so every `Row`
/// can be serialized without truncation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    id: u32,
    username: String,
    email: String,
}

impl Row {
    /// Create a row, rejecting fields that exceed their byte budgets.
    pub fn new(
        id: u32,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<Self, RowError> {
        let username = username.into();
        let email = email.into();

        if username.len() > COLUMN_USERNAME_SIZE {
            return Err(RowError::UsernameTooLong(username.len()));
        }
        if email.len() > COLUMN_EMAIL_SIZE {
            return Err(RowError::EmailTooLong(email.len()));
        }
        // NUL terminates a field on disk, so it can't appear inside one.
        if username.contains('\0') {
            return Err(RowError::EmbeddedNul("username"));
        }
        if email.contains('\0') {
            return Err(RowError::EmbeddedNul("email"));
        }

        Ok(Self {
            id,
            username,
            email,
        })
    }

    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Serialize the row into its fixed-width form.
    #[must_use]
    pub fn serialize(&self) -> [u8; ROW_SIZE] {
        let mut buf = [0u8; ROW_SIZE];
        buf[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());
        buf[USERNAME_OFFSET..USERNAME_OFFSET + self.username.len()]
            .copy_from_slice(self.username.as_bytes());
        buf[EMAIL_OFFSET..EMAIL_OFFSET + self.email.len()].copy_from_slice(self.email.as_bytes());
        buf
    }

    /// Deserialize a row from its fixed-width form.
    ///
    /// Each string field ends at its first NUL byte. Invalid UTF-8 is
    /// replaced rather than rejected.
    #[must_use]
    pub fn deserialize(bytes: &[u8; ROW_SIZE]) -> Self {
        let id = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let username = read_fixed_str(&bytes[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]);
        let email = read_fixed_str(&bytes[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]);

        Self {
            id,
            username,
            email,
        }
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username, self.email)
    }
}

fn read_fixed_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Errors for rows that can't be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// Username longer than `COLUMN_USERNAME_SIZE` bytes.
    UsernameTooLong(usize),
    /// Email longer than `COLUMN_EMAIL_SIZE` bytes.
    EmailTooLong(usize),
    /// A field contains a NUL byte.
    EmbeddedNul(&'static str),
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UsernameTooLong(len) => write!(
                f,
                "username too long: {len} bytes (max {COLUMN_USERNAME_SIZE})"
            ),
            Self::EmailTooLong(len) => {
                write!(f, "email too long: {len} bytes (max {COLUMN_EMAIL_SIZE})")
            }
            Self::EmbeddedNul(field) => write!(f, "{field} contains a NUL byte"),
        }
    }
}

impl std::error::Error for RowError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_constants() {
        assert_eq!(ROW_SIZE, 293);
        assert_eq!(USERNAME_OFFSET, 4);
        assert_eq!(EMAIL_OFFSET, 37);
    }

    #[test]
    fn test_serialize_field_offsets() {
        let row = Row::new(0x0102_0304, "alice", "alice@example.com").expect("valid row");
        let bytes = row.serialize();

        assert_eq!(&bytes[0..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[4..9], b"alice");
        assert_eq!(bytes[9], 0);
        assert_eq!(&bytes[37..54], b"alice@example.com");
        assert!(bytes[54..].iter().all(|&b| b == 0));

        assert_eq!(Row::deserialize(&bytes), row);
    }

    #[test]
    fn test_maximum_length_fields_fit() {
        let username = "u".repeat(COLUMN_USERNAME_SIZE);
        let email = "e".repeat(COLUMN_EMAIL_SIZE);
        let row = Row::new(u32::MAX, username.as_str(), email.as_str()).expect("valid row");

        let restored = Row::deserialize(&row.serialize());
        assert_eq!(restored.username(), username);
        assert_eq!(restored.email(), email);
        assert_eq!(restored.id(), u32::MAX);
    }

    #[test]
    fn test_rejects_oversized_fields() {
        let long_name = "a".repeat(COLUMN_USERNAME_SIZE + 1);
        assert_eq!(
            Row::new(1, long_name, "x"),
            Err(RowError::UsernameTooLong(33))
        );

        let long_email = "a".repeat(COLUMN_EMAIL_SIZE + 1);
        assert_eq!(Row::new(1, "x", long_email), Err(RowError::EmailTooLong(256)));
    }

    #[test]
    fn test_rejects_embedded_nul() {
        assert_eq!(
            Row::new(1, "a\0b", "x"),
            Err(RowError::EmbeddedNul("username"))
        );
    }

    #[test]
    fn test_display() {
        let row = Row::new(3, "bob", "bob@example.com").expect("valid row");
        assert_eq!(row.to_string(), "(3, bob, bob@example.com)");
    }
}
