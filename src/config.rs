//! SEA JSON configuration: parse, validate, and drive blob generation.
//!
//! The config file is the one consumed by the runtime's
//! `--experimental-sea-config` flag, extended with a `smol` section for the
//! VFS and update-checker settings.  Validation is strict: every violation
//! names the offending field and the rule, and nothing is silently
//! truncated.  The parsed result feeds two byte-exact serializers in
//! `auxcfg` and one collaborator call (the runtime's blob generator).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::auxcfg::{
    UpdateConfig, VfsConfig, VfsMode, DEFAULT_VFS_PREFIX, MAX_BINNAME, MAX_COMMAND,
    MAX_FAKE_ARGV_ENV, MAX_SKIP_ENV, MAX_TAG, MAX_URL, MAX_VFS_PREFIX,
};
use crate::collab::Collaborator;
use crate::error::{InjectError, Result};

// ── Raw serde model ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSeaConfig {
    main: Option<String>,
    output: Option<String>,
    #[serde(rename = "disableExperimentalSEAWarning")]
    disable_experimental_sea_warning: Option<bool>,
    use_code_cache: Option<bool>,
    assets: Option<BTreeMap<String, String>>,
    smol: Option<RawSmol>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSmol {
    vfs: Option<serde_json::Value>,
    update: Option<RawUpdate>,
    fake_argv_env: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUpdate {
    binname: Option<String>,
    command: Option<String>,
    url: Option<String>,
    tag: Option<String>,
    skip_env: Option<String>,
    interval: Option<serde_json::Number>,
    notify_interval: Option<serde_json::Number>,
    prompt: Option<bool>,
    prompt_default: Option<String>,
}

// ── Validated config ─────────────────────────────────────────────────────────

/// A validated SEA configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SeaConfig {
    pub main: String,
    /// Blob output path, relative to the config's directory.
    pub output: PathBuf,
    pub disable_experimental_sea_warning: bool,
    pub use_code_cache: bool,
    pub assets: BTreeMap<String, PathBuf>,
    /// `None` when `smol.vfs` is absent or `false`.
    pub vfs: Option<VfsConfig>,
    /// Update-checker settings, defaults applied.
    pub update: UpdateConfig,
}

fn invalid(field: &str, rule: impl std::fmt::Display) -> InjectError {
    InjectError::InvalidArg(format!("SEA config field `{field}`: {rule}"))
}

/// Parse and validate SEA config bytes.  `base_dir` anchors relative asset
/// paths for the existence check.
pub fn parse_sea_config(json_bytes: &[u8], base_dir: &Path) -> Result<SeaConfig> {
    let raw: RawSeaConfig = serde_json::from_slice(json_bytes)
        .map_err(|e| InjectError::InvalidArg(format!("SEA config is not valid JSON: {e}")))?;

    let main = raw
        .main
        .ok_or_else(|| invalid("main", "required but missing"))?;
    let output = raw
        .output
        .ok_or_else(|| invalid("output", "required but missing"))?;
    if output.is_empty() {
        return Err(invalid("output", "must not be empty"));
    }
    // Absolute output paths are rejected so a hostile config cannot write
    // outside the working directory.
    if Path::new(&output).is_absolute() {
        return Err(invalid("output", "must be a relative path"));
    }

    let mut assets = BTreeMap::new();
    for (name, value) in raw.assets.unwrap_or_default() {
        let path = base_dir.join(&value);
        if !path.exists() {
            return Err(invalid(
                &format!("assets.{name}"),
                format_args!("path `{value}` does not exist"),
            ));
        }
        assets.insert(name, path);
    }

    let (vfs, update) = match raw.smol {
        None => (None, UpdateConfig::default()),
        Some(smol) => {
            let vfs = parse_vfs_value(smol.vfs)?;
            let mut update = match smol.update {
                None => UpdateConfig::default(),
                Some(u) => validate_update(u)?,
            };
            if let Some(env) = smol.fake_argv_env {
                check_len("smol.fakeArgvEnv", &env, MAX_FAKE_ARGV_ENV)?;
                update.fake_argv_env = env;
            }
            (vfs, update)
        }
    };

    Ok(SeaConfig {
        main,
        output: PathBuf::from(output),
        disable_experimental_sea_warning: raw.disable_experimental_sea_warning.unwrap_or(false),
        use_code_cache: raw.use_code_cache.unwrap_or(false),
        assets,
        vfs,
        update,
    })
}

/// `smol.vfs` accepts `true`/`{}` (defaults), `false` (disabled), or an
/// explicit `{mode, source, prefix}` object.
fn parse_vfs_value(value: Option<serde_json::Value>) -> Result<Option<VfsConfig>> {
    use serde_json::Value;
    let Some(value) = value else { return Ok(None) };
    match value {
        Value::Bool(false) => Ok(None),
        Value::Bool(true) => Ok(Some(VfsConfig::default())),
        Value::Object(map) => {
            let mut cfg = VfsConfig::default();
            if let Some(mode) = map.get("mode") {
                let s = mode
                    .as_str()
                    .ok_or_else(|| invalid("smol.vfs.mode", "must be a string"))?;
                cfg.mode = VfsMode::from_name(s).ok_or_else(|| {
                    invalid(
                        "smol.vfs.mode",
                        format_args!("`{s}` is not one of in-memory, on-disk, compat"),
                    )
                })?;
            }
            if let Some(source) = map.get("source") {
                let s = source
                    .as_str()
                    .ok_or_else(|| invalid("smol.vfs.source", "must be a string"))?;
                cfg.source = PathBuf::from(s);
            }
            if let Some(prefix) = map.get("prefix") {
                let s = prefix
                    .as_str()
                    .ok_or_else(|| invalid("smol.vfs.prefix", "must be a string"))?;
                check_len("smol.vfs.prefix", s, MAX_VFS_PREFIX)?;
                cfg.prefix = s.to_owned();
            } else {
                cfg.prefix = DEFAULT_VFS_PREFIX.to_owned();
            }
            Ok(Some(cfg))
        }
        other => Err(invalid(
            "smol.vfs",
            format_args!("must be a boolean or an object, got {other}"),
        )),
    }
}

fn check_len(field: &str, s: &str, max: usize) -> Result<()> {
    if s.len() > max {
        return Err(invalid(
            field,
            format_args!("is {} bytes, maximum is {max}", s.len()),
        ));
    }
    Ok(())
}

fn validate_update(raw: RawUpdate) -> Result<UpdateConfig> {
    let mut cfg = UpdateConfig::default();

    if let Some(binname) = raw.binname {
        check_len("smol.update.binname", &binname, MAX_BINNAME)?;
        cfg.binname = binname;
    }
    if let Some(command) = raw.command {
        check_len("smol.update.command", &command, MAX_COMMAND)?;
        cfg.command = command;
    }
    if let Some(url) = raw.url {
        check_len("smol.update.url", &url, MAX_URL)?;
        if !url.is_empty() && !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(invalid(
                "smol.update.url",
                "must start with http:// or https:// (or be empty)",
            ));
        }
        cfg.url = url;
    }
    if let Some(tag) = raw.tag {
        check_len("smol.update.tag", &tag, MAX_TAG)?;
        cfg.tag = tag;
    }
    if let Some(skip_env) = raw.skip_env {
        check_len("smol.update.skipEnv", &skip_env, MAX_SKIP_ENV)?;
        cfg.skip_env = skip_env;
    }
    if let Some(interval) = raw.interval {
        cfg.interval_ms = validate_interval("smol.update.interval", &interval)?;
    }
    if let Some(notify) = raw.notify_interval {
        cfg.notify_interval_ms = validate_interval("smol.update.notifyInterval", &notify)?;
    }
    if let Some(prompt) = raw.prompt {
        cfg.prompt = prompt;
    }
    if let Some(pd) = raw.prompt_default {
        cfg.prompt_default = match pd.as_str() {
            "y" | "Y" | "yes" | "Yes" | "YES" => b'y',
            "n" | "N" | "no" | "No" | "NO" => b'n',
            other => {
                return Err(invalid(
                    "smol.update.promptDefault",
                    format_args!("`{other}` is not a recognised yes/no spelling"),
                ))
            }
        };
    }
    Ok(cfg)
}

fn validate_interval(field: &str, n: &serde_json::Number) -> Result<i64> {
    let v = n
        .as_f64()
        .ok_or_else(|| invalid(field, "must be a number"))?;
    if !v.is_finite() {
        return Err(invalid(field, "must be finite"));
    }
    if v < 0.0 {
        return Err(invalid(field, "must be ≥ 0"));
    }
    if v > i64::MAX as f64 {
        return Err(invalid(field, "exceeds the i64 millisecond range"));
    }
    Ok(v as i64)
}

// ── Blob generation ──────────────────────────────────────────────────────────

/// Invoke the runtime's blob generator and return the blob bytes.
///
/// `config_path` is the SEA config on disk; the runtime runs in that file's
/// directory and writes the blob to the config's (relative) `output` path.
pub fn generate_sea_blob(
    config: &SeaConfig,
    config_path: &Path,
    collab: &dyn Collaborator,
) -> Result<Vec<u8>> {
    let workdir = config_path.parent().unwrap_or_else(|| Path::new("."));
    collab.generate_blob(config_path, workdir)?;

    let blob_path = workdir.join(&config.output);
    tracing::debug!(blob = %blob_path.display(), "reading generated SEA blob");
    std::fs::read(&blob_path).map_err(|e| {
        InjectError::BlobGenerationFailed(format!(
            "runtime exited cleanly but `{}` is unreadable: {e}",
            blob_path.display()
        ))
    })
}

/// True when `path`/`bytes` look like a SEA JSON config rather than a
/// prebuilt blob: `.json` extension, or a leading ASCII `{`.
pub fn looks_like_config(path: &Path, bytes: &[u8]) -> bool {
    if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")) {
        return true;
    }
    bytes.first() == Some(&b'{')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<SeaConfig> {
        parse_sea_config(json.as_bytes(), Path::new("."))
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = parse(r#"{"main":"app.js","output":"sea.blob"}"#).unwrap();
        assert_eq!(cfg.main, "app.js");
        assert_eq!(cfg.output, PathBuf::from("sea.blob"));
        assert!(!cfg.disable_experimental_sea_warning);
        assert!(!cfg.use_code_cache);
        assert!(cfg.assets.is_empty());
        assert!(cfg.vfs.is_none());
        assert_eq!(cfg.update, UpdateConfig::default());
    }

    #[test]
    fn missing_required_fields_are_named() {
        let err = parse(r#"{"output":"sea.blob"}"#).unwrap_err();
        assert!(err.to_string().contains("main"), "{err}");
        let err = parse(r#"{"main":"app.js"}"#).unwrap_err();
        assert!(err.to_string().contains("output"), "{err}");
    }

    #[test]
    fn absolute_output_rejected() {
        let err = parse(r#"{"main":"app.js","output":"/tmp/sea.blob"}"#).unwrap_err();
        assert!(err.to_string().contains("relative"), "{err}");
    }

    #[test]
    fn vfs_shorthands() {
        let cfg = parse(r#"{"main":"a","output":"b","smol":{"vfs":true}}"#).unwrap();
        let vfs = cfg.vfs.unwrap();
        assert_eq!(vfs.mode, VfsMode::InMemory);
        assert_eq!(vfs.source, PathBuf::from("node_modules"));
        assert_eq!(vfs.prefix, "/");

        let cfg = parse(r#"{"main":"a","output":"b","smol":{"vfs":{}}}"#).unwrap();
        assert_eq!(cfg.vfs.unwrap(), VfsConfig::default());

        let cfg = parse(r#"{"main":"a","output":"b","smol":{"vfs":false}}"#).unwrap();
        assert!(cfg.vfs.is_none());

        let cfg = parse(
            r#"{"main":"a","output":"b","smol":{"vfs":{"mode":"on-disk","source":"dist","prefix":"/app"}}}"#,
        )
        .unwrap();
        let vfs = cfg.vfs.unwrap();
        assert_eq!(vfs.mode, VfsMode::OnDisk);
        assert_eq!(vfs.source, PathBuf::from("dist"));
        assert_eq!(vfs.prefix, "/app");
    }

    #[test]
    fn unknown_vfs_mode_rejected() {
        let err =
            parse(r#"{"main":"a","output":"b","smol":{"vfs":{"mode":"turbo"}}}"#).unwrap_err();
        assert!(err.to_string().contains("smol.vfs.mode"), "{err}");
    }

    #[test]
    fn update_length_bounds_name_the_field() {
        for (field, json_field, max) in [
            ("binname", "binname", MAX_BINNAME),
            ("command", "command", MAX_COMMAND),
            ("url", "url", MAX_URL),
            ("tag", "tag", MAX_TAG),
            ("skipEnv", "skipEnv", MAX_SKIP_ENV),
        ] {
            let long = "x".repeat(max + 1);
            let json = format!(
                r#"{{"main":"a","output":"b","smol":{{"update":{{"{json_field}":"{long}"}}}}}}"#
            );
            let err = parse(&json).unwrap_err();
            assert!(matches!(err, InjectError::InvalidArg(_)), "{field}");
            assert!(err.to_string().contains(field), "{field}: {err}");
        }
    }

    #[test]
    fn url_scheme_enforced() {
        let err = parse(r#"{"main":"a","output":"b","smol":{"update":{"url":"ftp://x"}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("smol.update.url"), "{err}");
        // Empty URL is permitted.
        let cfg =
            parse(r#"{"main":"a","output":"b","smol":{"update":{"url":""}}}"#).unwrap();
        assert_eq!(cfg.update.url, "");
    }

    #[test]
    fn prompt_default_normalization() {
        for (spelling, want) in [
            ("y", b'y'),
            ("Yes", b'y'),
            ("YES", b'y'),
            ("n", b'n'),
            ("No", b'n'),
            ("NO", b'n'),
        ] {
            let json = format!(
                r#"{{"main":"a","output":"b","smol":{{"update":{{"promptDefault":"{spelling}"}}}}}}"#
            );
            assert_eq!(parse(&json).unwrap().update.prompt_default, want, "{spelling}");
        }
        let err = parse(r#"{"main":"a","output":"b","smol":{"update":{"promptDefault":"maybe"}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("promptDefault"), "{err}");
    }

    #[test]
    fn negative_interval_rejected() {
        let err = parse(r#"{"main":"a","output":"b","smol":{"update":{"interval":-1}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("interval"), "{err}");
    }

    #[test]
    fn missing_asset_named() {
        let err = parse(
            r#"{"main":"a","output":"b","assets":{"icon":"definitely/not/here.png"}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("assets.icon"), "{err}");
    }

    #[test]
    fn config_detection() {
        assert!(looks_like_config(Path::new("sea-config.json"), b"whatever"));
        assert!(looks_like_config(Path::new("cfg"), b"{\"main\":1}"));
        assert!(!looks_like_config(Path::new("sea.blob"), b"\x00\x01binary"));
    }
}
