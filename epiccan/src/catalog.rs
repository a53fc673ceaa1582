//! Variable and function catalogs
//!
//! The offline generator scrapes the firmware lookup tables into
//! `variables.json` and `functions_v1.json`; this module loads those
//! descriptors. Loading is deliberately lenient: a missing or unreadable
//! descriptor yields an empty catalog so the tools stay usable against a
//! bare checkout.

use crate::proto;
use serde::Deserialize;

use std::fmt;
use std::path::Path;

/// Where a variable lives on the controller. Config variables are
/// writable, outputs are read-only measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Config,
    Output,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SourceKind::Config => write!(f, "config"),
            SourceKind::Output => write!(f, "output"),
        }
    }
}

/// One named signal known for the target firmware.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub hash: i32,
    pub source: SourceKind,
}

/// One remotely callable function.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionEntry {
    #[serde(rename = "luaName")]
    pub lua_name: String,
    pub id: u16,
    #[serde(default)]
    pub arg: Option<String>,
    #[serde(default)]
    pub ret: Option<String>,
}

/// Loads the variable catalog, in descriptor order. Never fails.
pub fn load_variables<P: AsRef<Path>>(path: P) -> Vec<CatalogEntry> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

/// Loads the function catalog. Never fails.
pub fn load_functions<P: AsRef<Path>>(path: P) -> Vec<FunctionEntry> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

/// Resolves a command-line token to a variable hash: an integer literal
/// (decimal, or hex with `0x`, possibly negative) is used directly,
/// anything else is hashed as a name.
pub fn resolve_var_token(token: &str) -> i32 {
    parse_int(token)
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or_else(|| proto::var_hash(token))
}

/// Resolves a command-line token to a function id: an integer literal is
/// used directly, otherwise the token must name a cataloged function.
pub fn resolve_func_token(funcs: &[FunctionEntry], token: &str) -> Option<u16> {
    if let Some(v) = parse_int(token) {
        return u16::try_from(v).ok();
    }
    funcs.iter().find(|f| f.lua_name == token).map(|f| f.id)
}

/// Case-insensitive catalog lookup by name.
pub fn find_by_name<'a>(catalog: &'a [CatalogEntry], name: &str) -> Option<&'a CatalogEntry> {
    catalog.iter().find(|e| e.name.eq_ignore_ascii_case(name))
}

fn parse_int(token: &str) -> Option<i64> {
    let (sign, rest) = match token.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, token),
    };
    let value = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        rest.parse::<i64>().ok()?
    };
    Some(sign * value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"[
            {"name": "idleTarget", "hash": 1001, "source": "config"},
            {"name": "rpm", "hash": 193504948, "source": "output"},
            {"name": "coolantTemp", "hash": -1603237749, "source": "output"}
        ]"#
    }

    #[test]
    fn parses_descriptor_in_order() {
        let catalog: Vec<CatalogEntry> = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog[0].name, "idleTarget");
        assert_eq!(catalog[0].source, SourceKind::Config);
        assert_eq!(catalog[1].hash, 193504948);
        assert_eq!(catalog[2].hash, -1603237749);
    }

    #[test]
    fn missing_file_yields_empty_catalog() {
        assert!(load_variables("/nonexistent/variables.json").is_empty());
        assert!(load_functions("/nonexistent/functions_v1.json").is_empty());
    }

    #[test]
    fn malformed_file_yields_empty_catalog() {
        let dir = std::env::temp_dir();
        let path = dir.join("epiccan-test-malformed-vars.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_variables(&path).is_empty());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn var_token_resolution() {
        assert_eq!(resolve_var_token("1234"), 1234);
        assert_eq!(resolve_var_token("-1603237749"), -1603237749);
        assert_eq!(resolve_var_token("0x10"), 16);
        assert_eq!(resolve_var_token("rpm"), 193504948);
    }

    #[test]
    fn func_token_resolution() {
        let funcs = vec![FunctionEntry {
            lua_name: "setLuaGauge".to_string(),
            id: 4,
            arg: Some("float".to_string()),
            ret: None,
        }];
        assert_eq!(resolve_func_token(&funcs, "4"), Some(4));
        assert_eq!(resolve_func_token(&funcs, "setLuaGauge"), Some(4));
        assert_eq!(resolve_func_token(&funcs, "nosuch"), None);
    }

    #[test]
    fn name_lookup_ignores_case() {
        let catalog: Vec<CatalogEntry> = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(
            find_by_name(&catalog, "IDLETARGET").map(|e| e.hash),
            Some(1001)
        );
        assert!(find_by_name(&catalog, "boost").is_none());
    }
}
