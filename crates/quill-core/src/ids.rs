//! Branded ID newtypes for type safety.
//!
//! Every entity in the Quill system has a distinct ID type implemented as a
//! newtype wrapper around `String`. This prevents accidentally passing a
//! chapter ID where a chunk ID is expected.
//!
//! Fresh IDs are UUID v7 (time-ordered) via [`uuid::Uuid::now_v7`], but all
//! types accept arbitrary strings because chapter and project naming is
//! owned by the host application.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a new UUID v7 string (time-ordered).
fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(new_v7())
            }

            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for a writing project.
    ProjectId
}

branded_id! {
    /// Unique identifier for a chapter within a project.
    ChapterId
}

branded_id! {
    /// Unique identifier for a chunk in the analysis tree.
    ///
    /// Chapter chunks reuse the chapter's ID string; scene chunks append a
    /// `::scene-N` suffix; the book root is the literal `"book"`.
    ChunkId
}

branded_id! {
    /// Unique identifier for a planning-memory note.
    NoteId
}
