use crate::error::{DevboardError, Result};
use clap::ValueEnum;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

/// External line counters with a JSON output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LocTool {
    Tokei,
    Scc,
    Cloc,
    /// Skip LOC counting entirely.
    None,
}

/// Per-language code line counts for the work tree at `path`.
pub fn count_lines(
    path: &Path,
    tool: LocTool,
    excluded_langs: &[String],
) -> Result<BTreeMap<String, u64>> {
    let mut cmd = match tool {
        LocTool::Tokei => {
            let mut c = Command::new("tokei");
            c.args(["--output", "json"]);
            c
        }
        LocTool::Scc => {
            let mut c = Command::new("scc");
            c.args(["--format", "json"]);
            c
        }
        LocTool::Cloc => {
            let mut c = Command::new("cloc");
            c.arg("--json");
            c
        }
        LocTool::None => return Ok(BTreeMap::new()),
    };

    let output = cmd.arg(path).output().map_err(|e| {
        DevboardError::Counter(format!("Failed to run line counter: {e}"))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DevboardError::Counter(format!(
            "Line counter exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    match tool {
        LocTool::Tokei => parse_tokei(&stdout, excluded_langs),
        LocTool::Scc => parse_scc(&stdout, excluded_langs),
        LocTool::Cloc => parse_cloc(&stdout, excluded_langs),
        LocTool::None => Ok(BTreeMap::new()),
    }
}

/// The language with the most lines, ties broken alphabetically.
pub fn primary_language(loc: &BTreeMap<String, u64>) -> Option<String> {
    loc.iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(lang, _)| lang.clone())
}

fn is_excluded(lang: &str, excluded: &[String]) -> bool {
    excluded.iter().any(|e| e.eq_ignore_ascii_case(lang))
}

/// Tokei emits a map of language to stats, plus a "Total" pseudo-entry.
pub fn parse_tokei(json: &str, excluded: &[String]) -> Result<BTreeMap<String, u64>> {
    let value: Value = serde_json::from_str(json)?;
    let Some(map) = value.as_object() else {
        return Err(DevboardError::Counter("Unexpected tokei output shape".to_string()));
    };

    let mut langs = BTreeMap::new();
    for (lang, stats) in map {
        if lang == "Total" || is_excluded(lang, excluded) {
            continue;
        }
        let Some(code) = stats.get("code").and_then(Value::as_u64) else {
            continue;
        };
        if code > 0 {
            langs.insert(lang.clone(), code);
        }
    }
    Ok(langs)
}

/// Scc emits an array of per-language objects.
pub fn parse_scc(json: &str, excluded: &[String]) -> Result<BTreeMap<String, u64>> {
    let value: Value = serde_json::from_str(json)?;
    let Some(items) = value.as_array() else {
        return Err(DevboardError::Counter("Unexpected scc output shape".to_string()));
    };

    let mut langs = BTreeMap::new();
    for item in items {
        let Some(lang) = item.get("Name").and_then(Value::as_str) else {
            continue;
        };
        if is_excluded(lang, excluded) {
            continue;
        }
        let code = item.get("Code").and_then(Value::as_u64).unwrap_or(0);
        if code > 0 {
            langs.insert(lang.to_string(), code);
        }
    }
    Ok(langs)
}

/// Cloc mixes "header" and "SUM" entries into its language map.
pub fn parse_cloc(json: &str, excluded: &[String]) -> Result<BTreeMap<String, u64>> {
    let value: Value = serde_json::from_str(json)?;
    let Some(map) = value.as_object() else {
        return Err(DevboardError::Counter("Unexpected cloc output shape".to_string()));
    };

    let mut langs = BTreeMap::new();
    for (lang, stats) in map {
        if lang == "header" || lang == "SUM" || is_excluded(lang, excluded) {
            continue;
        }
        let Some(code) = stats.get("code").and_then(Value::as_u64) else {
            continue;
        };
        if code > 0 {
            langs.insert(lang.clone(), code);
        }
    }
    Ok(langs)
}
