//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **Text processing**: HTML-to-text conversion and character-safe truncation
//! - **Links**: URL normalization, publisher origins and favicon lookups
//!
//! # Examples
//!
//! ```
//! use newspush::util::{html_to_text, normalize_url, truncate_chars};
//!
//! let text = html_to_text("<p>Breaking &amp; new</p>");
//! assert_eq!(text, "Breaking & new");
//!
//! let snippet = truncate_chars(&text, 8);
//! assert_eq!(snippet, "Breaking...");
//!
//! let url = normalize_url("//cdn.example.com/a.png").unwrap();
//! assert_eq!(url, "https://cdn.example.com/a.png");
//! ```

mod links;
mod text;

pub use links::{favicon_url, normalize_url, publisher_origin, LinkError};
pub use text::{html_to_text, strip_control_chars, truncate_chars};
