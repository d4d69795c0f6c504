//! Closed enumeration of the tables the content backend owns
//!
//! `DbTable` is the only table identifier dynamic SQL accepts. A runtime
//! string becomes a `DbTable` through [`FromStr`] or not at all.

use config::BackendKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::validation::{quote_identifier, ValidationError};

macro_rules! db_tables {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// A validated table identifier
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum DbTable {
            $($variant),+
        }

        impl DbTable {
            /// Every table, in declaration order
            pub const ALL: &'static [DbTable] = &[$(DbTable::$variant),+];

            /// Canonical table name as it exists in every engine
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(DbTable::$variant => $name),+
                }
            }
        }

        impl FromStr for DbTable {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(DbTable::$variant),)+
                    other => Err(ValidationError::UnknownTable(other.to_string())),
                }
            }
        }
    };
}

db_tables! {
    AdminContentData => "admin_content_data",
    AdminContentFields => "admin_content_fields",
    AdminDatatypes => "admin_datatypes",
    AdminFields => "admin_fields",
    AdminRoutes => "admin_routes",
    ChangeEvents => "change_events",
    ContentData => "content_data",
    ContentFields => "content_fields",
    Datatypes => "datatypes",
    DatatypesFields => "datatypes_fields",
    Fields => "fields",
    Media => "media",
    MediaDimensions => "media_dimensions",
    Permissions => "permissions",
    Roles => "roles",
    Routes => "routes",
    Sessions => "sessions",
    Tables => "tables",
    Tokens => "tokens",
    UserOauth => "user_oauth",
    Users => "users",
}

impl DbTable {
    /// The name quoted for `backend`
    pub fn quoted(&self, backend: BackendKind) -> String {
        quote_identifier(backend, self.as_str())
    }
}

impl fmt::Display for DbTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for DbTable {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
