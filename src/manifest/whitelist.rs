// src/manifest/whitelist.rs

//! Character whitelist for descriptor fields that end up in shell wrappers
//! and unit files
//!
//! Only the fields listed by each `Whitelisted` impl are checked. New
//! descriptor fields are not validated until they are added here.

use super::{Binary, Service};
use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Legal characters in the "binaries" and "services" sections
pub const WHITELIST_PATTERN: &str = r"^[A-Za-z0-9/. _#:-]*$";

static WHITELIST: LazyLock<Regex> = LazyLock::new(|| Regex::new(WHITELIST_PATTERN).unwrap());

/// A descriptor entry with string fields subject to the whitelist
pub trait Whitelisted {
    /// `(field name, value)` pairs to validate
    fn whitelisted_fields(&self) -> Vec<(&'static str, &str)>;
}

impl Whitelisted for Binary {
    fn whitelisted_fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("name", self.name.as_str()),
            ("exec", self.exec.as_str()),
            ("description", self.description.as_str()),
        ]
    }
}

impl Whitelisted for Service {
    fn whitelisted_fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("name", self.name.as_str()),
            ("description", self.description.as_str()),
            ("start", self.start.as_str()),
            ("stop", self.stop.as_str()),
            ("poststop", self.poststop.as_str()),
        ]
    }
}

/// Check every whitelisted field, failing on the first illegal one
pub fn verify_whitelist(item: &impl Whitelisted) -> Result<()> {
    for (field, content) in item.whitelisted_fields() {
        if !WHITELIST.is_match(content) {
            return Err(Error::WhitelistViolation {
                field: field.to_string(),
                content: content.to_string(),
                whitelist: WHITELIST_PATTERN,
            });
        }
    }
    Ok(())
}
