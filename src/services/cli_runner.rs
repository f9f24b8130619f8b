use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::env;
use std::process::Command;

/// Expands `${NAME}` from `vars`, falling back to the process environment.
/// Values containing whitespace are quoted so they stay one argument.
pub fn expand_cmdline(cmdline: &str, vars: &HashMap<&str, String>) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z0-9_]+)\}")?;
    let expanded = re.replace_all(cmdline, |caps: &regex::Captures| {
        let key = &caps[1];
        let value = vars
            .get(key)
            .cloned()
            .or_else(|| env::var(key).ok())
            .unwrap_or_default();
        if value.chars().any(|c| c.is_whitespace()) {
            let escaped = value.replace('"', "\\\"");
            format!("\"{escaped}\"")
        } else {
            value
        }
    });
    Ok(expanded.to_string())
}

/// Runs a backend command and parses its stdout as JSON.
pub fn run_cmdline_to_json(
    cmdline: &str,
    vars: &HashMap<&str, String>,
    envs: &[(&str, String)],
) -> Result<JsonValue> {
    let expanded = expand_cmdline(cmdline, vars)?;
    let parts = shlex::split(&expanded).ok_or_else(|| anyhow!("Failed to parse command line"))?;
    if parts.is_empty() {
        return Err(anyhow!("Empty command line"));
    }
    let program = &parts[0];
    let args = &parts[1..];
    let mut cmd = Command::new(program);
    cmd.args(args).env("MINIBOARD_JSON", "1");
    for (k, v) in envs {
        cmd.env(k, v);
    }
    let output = cmd
        .output()
        .with_context(|| format!("spawning {expanded}"))?;
    if !output.status.success() {
        let err = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(anyhow!("Command failed: {}\n{}", cmdline, err));
    }
    let text = String::from_utf8_lossy(&output.stdout).to_string();
    let v: JsonValue = serde_json::from_str(&text).with_context(|| "parsing command JSON")?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_vars_and_quotes_whitespace() {
        let mut vars = HashMap::new();
        vars.insert("ACTION", "insert".to_string());
        vars.insert("ENTITY", "person".to_string());
        vars.insert("NOTE", "two words".to_string());
        let out = expand_cmdline("cosi ${ACTION} ${ENTITY} ${NOTE}", &vars).unwrap();
        assert_eq!(out, "cosi insert person \"two words\"");
        let parts = shlex::split(&out).unwrap();
        assert_eq!(parts.len(), 4);
    }

    #[test]
    fn unknown_vars_expand_to_empty() {
        let out = expand_cmdline("x ${MINIBOARD_SURELY_UNSET_VAR}", &HashMap::new()).unwrap();
        assert_eq!(out.trim(), "x");
    }

    #[test]
    fn empty_command_line_is_an_error() {
        assert!(run_cmdline_to_json("   ", &HashMap::new(), &[]).is_err());
    }
}
