//! Compile-time defines from a project `.env` file.
//!
//! Each `KEY=VALUE` line becomes a preprocessor define whose value is a C
//! string literal, so firmware code can use `WIFI_SSID` and friends directly.
use crate::cli::{EnvFlagsArgs, FlagFormat};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

pub const MISSING_ENV_WARNING: &str = "WARNING: .env file not found! Copy .env.example to .env";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CppDefine {
    pub key: String,
    pub value: String,
}

impl CppDefine {
    pub fn literal(&self) -> String {
        c_string_literal(&self.value)
    }
}

/// Receives defines, e.g. a build tool's `CPPDEFINES`.
pub trait DefineSink {
    fn append_define(&mut self, define: CppDefine);
}

/// In-memory define list, in file order.
#[derive(Debug, Default)]
pub struct CppDefines {
    defines: Vec<CppDefine>,
}

impl CppDefines {
    pub fn defines(&self) -> &[CppDefine] {
        &self.defines
    }
}

impl DefineSink for CppDefines {
    fn append_define(&mut self, define: CppDefine) {
        self.defines.push(define);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectOutcome {
    Loaded(usize),
    Missing,
}

/// Parse `KEY=VALUE` lines, splitting at the first `=`. Blank lines, `#`
/// comments and lines without `=` are skipped.
pub fn parse_defines(text: &str) -> Vec<CppDefine> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| CppDefine {
            key: key.to_string(),
            value: value.to_string(),
        })
        .collect()
}

/// Quote `value` as a C string literal.
pub fn c_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // Octal escapes stop after three digits, unlike \x.
            ch if ch.is_ascii_control() => out.push_str(&format!("\\{:03o}", ch as u32)),
            ch => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Append every define from `path` to `sink`. A missing file is not an error.
pub fn inject_env_file(path: &Path, sink: &mut dyn DefineSink) -> Result<InjectOutcome> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "env file not found");
        eprintln!("{MISSING_ENV_WARNING}");
        return Ok(InjectOutcome::Missing);
    }
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let defines = parse_defines(&text);
    let count = defines.len();
    for define in defines {
        tracing::debug!(key = %define.key, "define");
        sink.append_define(define);
    }
    Ok(InjectOutcome::Loaded(count))
}

pub fn render_build_flags(defines: &[CppDefine], format: FlagFormat) -> Result<Vec<String>> {
    defines
        .iter()
        .map(|define| match format {
            FlagFormat::BuildFlags => {
                let flag = format!("{}={}", define.key, define.literal());
                Ok(format!("-D {}", shell_words::quote(&flag)))
            }
            FlagFormat::Cargo => {
                if define.value.contains(['\n', '\r']) {
                    return Err(anyhow!(
                        "{} contains a line break; cargo:rustc-env cannot carry it",
                        define.key
                    ));
                }
                Ok(format!("cargo:rustc-env={}={}", define.key, define.value))
            }
        })
        .collect()
}

pub fn env_flags(args: EnvFlagsArgs) -> Result<()> {
    let path = args.project_dir.join(&args.env_file);
    let mut defines = CppDefines::default();
    let outcome = inject_env_file(&path, &mut defines)?;
    tracing::info!(path = %path.display(), ?outcome, "env file processed");
    for line in render_build_flags(defines.defines(), args.format)? {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn define(key: &str, value: &str) -> CppDefine {
        CppDefine {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn parse_skips_comments_and_keeps_later_equals() {
        let text = "# wifi\nWIFI_SSID=home net\n\n  API_ENDPOINT=https://x.test/api?a=b  \nnot a define\n#X=1\n";
        assert_eq!(
            parse_defines(text),
            vec![
                define("WIFI_SSID", "home net"),
                define("API_ENDPOINT", "https://x.test/api?a=b"),
            ]
        );
    }

    #[test]
    fn literal_escapes() {
        assert_eq!(c_string_literal("plain"), "\"plain\"");
        assert_eq!(c_string_literal(""), "\"\"");
        assert_eq!(c_string_literal(r#"a"b\c"#), r#""a\"b\\c""#);
        assert_eq!(c_string_literal("a\tb\nc"), "\"a\\tb\\nc\"");
        assert_eq!(c_string_literal("\u{1}7"), "\"\\0017\"");
    }

    #[test]
    fn missing_file_adds_nothing() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let mut sink = CppDefines::default();
        let outcome = inject_env_file(&dir.path().join(".env"), &mut sink).expect("inject");
        assert_eq!(outcome, InjectOutcome::Missing);
        assert!(sink.defines().is_empty());
    }

    #[test]
    fn present_file_appends_in_order() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join(".env");
        fs::write(&path, "WIFI_SSID=tub\nWIFI_PASSWORD=p\"w\n").expect("write env");
        let mut sink = CppDefines::default();
        let outcome = inject_env_file(&path, &mut sink).expect("inject");
        assert_eq!(outcome, InjectOutcome::Loaded(2));
        assert_eq!(sink.defines()[1], define("WIFI_PASSWORD", "p\"w"));
        assert_eq!(sink.defines()[1].literal(), "\"p\\\"w\"");
    }

    #[test]
    fn build_flags_are_shell_quoted() {
        let lines = render_build_flags(
            &[define("WIFI_SSID", "home net"), define("ESP32_API_KEY", "k'1")],
            FlagFormat::BuildFlags,
        )
        .expect("render");
        assert_eq!(lines[0], "-D 'WIFI_SSID=\"home net\"'");
        let words = shell_words::split(&lines[1]).expect("split");
        assert_eq!(words, vec!["-D", "ESP32_API_KEY=\"k'1\""]);
    }

    #[test]
    fn cargo_format_rejects_line_breaks() {
        let lines =
            render_build_flags(&[define("API_ENDPOINT", "https://x.test")], FlagFormat::Cargo)
                .expect("render");
        assert_eq!(lines, vec!["cargo:rustc-env=API_ENDPOINT=https://x.test"]);

        let err = render_build_flags(&[define("BAD", "a\nb")], FlagFormat::Cargo)
            .expect_err("line break");
        assert!(err.to_string().contains("BAD"));
    }
}
