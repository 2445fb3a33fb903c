//! `exec:` / `shell:` tool configuration sugars.
//!
//! Both forms expand to the canonical `command: []` + `parameters: []`
//! representation before validation:
//!
//! - `exec: "grep -n ${pattern} ${file}"` — tokenized, executed directly
//!   (no shell). Each `${name}` placeholder becomes a string parameter.
//! - `shell: "cat ${file} | head -n ${n:raw}"` — wrapped as
//!   `/bin/sh -c "<template>"`. `${name}` substitutes a single-quoted
//!   value; `${name:raw}` substitutes the value verbatim.
//!
//! Placeholder parameters are inferred in first-occurrence order. An
//! optional `parameters:` list on the sugar form supplies descriptions and
//! type hints for inferred names; it may not introduce names absent from
//! the template.

use regex::Regex;

use crate::tool::{Injection, ToolDefinition, ToolParameter};
use crate::{Error, Result};

/// Pre-expansion tool shape as it appears in agent configuration.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ToolConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Canonical form.
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub parameters: Option<Vec<ParamConfig>>,
    /// Direct-exec sugar.
    #[serde(default)]
    pub exec: Option<String>,
    /// `/bin/sh -c` sugar.
    #[serde(default)]
    pub shell: Option<String>,
}

/// Pre-expansion parameter shape. `inject_as` defaults to `argument`;
/// for the sugar forms it must be omitted (placeholders decide).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ParamConfig {
    pub name: String,
    #[serde(default = "d_string", rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub inject_as: Option<String>,
    #[serde(default)]
    pub option_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn d_string() -> String {
    "string".into()
}

impl ParamConfig {
    fn into_tool_parameter(self) -> Result<ToolParameter> {
        let inject = match self.inject_as.as_deref().unwrap_or("argument") {
            "argument" => Injection::Argument,
            "stdin" => Injection::Stdin,
            "option" => Injection::Option {
                option_name: self.option_name.ok_or_else(|| {
                    Error::Config(format!(
                        "parameter '{}': option injection requires option_name",
                        self.name
                    ))
                })?,
            },
            other => {
                return Err(Error::Config(format!(
                    "parameter '{}': unknown injection mode '{other}'",
                    self.name
                )))
            }
        };
        Ok(ToolParameter {
            name: self.name,
            param_type: self.param_type,
            inject,
            description: self.description,
        })
    }
}

fn placeholder_re() -> Regex {
    // Compiled per call; expansion happens once per tool at load time.
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:raw)?\}").expect("placeholder regex")
}

/// Names referenced by `${...}` placeholders, in first-occurrence order.
fn placeholder_names(template: &str, allow_raw: bool) -> Result<Vec<String>> {
    let re = placeholder_re();
    let mut names: Vec<String> = Vec::new();
    for cap in re.captures_iter(template) {
        if cap.get(2).is_some() && !allow_raw {
            return Err(Error::Config(format!(
                "':raw' placeholders are only valid in shell: templates (found ${{{}:raw}})",
                &cap[1]
            )));
        }
        let name = cap[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names)
}

/// Split an `exec:` template into argv tokens, honoring single and double
/// quotes. Placeholders stay embedded in their token.
fn tokenize(template: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for ch in template.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                } else {
                    current.push(ch);
                }
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }
    if quote.is_some() {
        return Err(Error::Config(format!(
            "unterminated quote in exec template: {template}"
        )));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn inferred_parameters(
    names: &[String],
    declared: Option<&[ParamConfig]>,
) -> Result<Vec<ToolParameter>> {
    if let Some(declared) = declared {
        for p in declared {
            if !names.iter().any(|n| n == &p.name) {
                return Err(Error::Config(format!(
                    "parameter '{}' is not referenced by the template",
                    p.name
                )));
            }
            if p.inject_as.is_some() {
                return Err(Error::Config(format!(
                    "parameter '{}': inject_as is not valid with exec/shell sugar",
                    p.name
                )));
            }
        }
    }
    Ok(names
        .iter()
        .map(|name| {
            let decl = declared.and_then(|ps| ps.iter().find(|p| &p.name == name));
            ToolParameter {
                name: name.clone(),
                param_type: decl
                    .map(|p| p.param_type.clone())
                    .unwrap_or_else(|| "string".into()),
                inject: Injection::Argument,
                description: decl.and_then(|p| p.description.clone()),
            }
        })
        .collect())
}

/// Expand a configured tool to its canonical form.
///
/// Exactly one of `command`, `exec`, `shell` must be present. The result
/// is validated before being returned.
pub fn expand_tool(cfg: ToolConfig) -> Result<ToolDefinition> {
    let forms = [
        cfg.command.is_some(),
        cfg.exec.is_some(),
        cfg.shell.is_some(),
    ]
    .iter()
    .filter(|b| **b)
    .count();
    if forms != 1 {
        return Err(Error::Config(format!(
            "tool '{}': exactly one of command, exec, shell must be given",
            cfg.name
        )));
    }

    let def = if let Some(command) = cfg.command {
        let parameters = cfg
            .parameters
            .unwrap_or_default()
            .into_iter()
            .map(ParamConfig::into_tool_parameter)
            .collect::<Result<Vec<_>>>()?;
        ToolDefinition {
            name: cfg.name,
            command,
            parameters,
            description: cfg.description,
        }
    } else if let Some(template) = cfg.exec {
        let names = placeholder_names(&template, false)?;
        let parameters = inferred_parameters(&names, cfg.parameters.as_deref())?;
        ToolDefinition {
            name: cfg.name,
            command: tokenize(&template)?,
            parameters,
            description: cfg.description,
        }
    } else {
        let template = cfg.shell.unwrap();
        let names = placeholder_names(&template, true)?;
        let parameters = inferred_parameters(&names, cfg.parameters.as_deref())?;
        ToolDefinition {
            name: cfg.name,
            command: vec!["/bin/sh".into(), "-c".into(), template],
            parameters,
            description: cfg.description,
        }
    };

    def.validate()?;
    Ok(def)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(name: &str) -> ToolConfig {
        ToolConfig {
            name: name.into(),
            description: None,
            command: None,
            parameters: None,
            exec: None,
            shell: None,
        }
    }

    #[test]
    fn exec_sugar_tokenizes_and_infers_params() {
        let mut c = cfg("search");
        c.exec = Some("grep -n ${pattern} ${file}".into());
        let def = expand_tool(c).unwrap();
        assert_eq!(def.command, vec!["grep", "-n", "${pattern}", "${file}"]);
        assert_eq!(def.parameters.len(), 2);
        assert_eq!(def.parameters[0].name, "pattern");
        assert_eq!(def.parameters[1].name, "file");
    }

    #[test]
    fn exec_sugar_rejects_raw() {
        let mut c = cfg("bad");
        c.exec = Some("echo ${x:raw}".into());
        assert!(expand_tool(c).is_err());
    }

    #[test]
    fn shell_sugar_wraps_in_sh() {
        let mut c = cfg("count");
        c.shell = Some("cat ${file} | wc -l".into());
        let def = expand_tool(c).unwrap();
        assert_eq!(def.command[0], "/bin/sh");
        assert_eq!(def.command[1], "-c");
        assert_eq!(def.command[2], "cat ${file} | wc -l");
        assert_eq!(def.parameters[0].name, "file");
    }

    #[test]
    fn shell_sugar_allows_raw_placeholders() {
        let mut c = cfg("head");
        c.shell = Some("head -n ${n:raw} ${file}".into());
        let def = expand_tool(c).unwrap();
        let names: Vec<_> = def.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["n", "file"]);
    }

    #[test]
    fn quoted_exec_tokens_keep_spaces() {
        let mut c = cfg("say");
        c.exec = Some(r#"echo "hello world" ${rest}"#.into());
        let def = expand_tool(c).unwrap();
        assert_eq!(def.command, vec!["echo", "hello world", "${rest}"]);
    }

    #[test]
    fn declared_parameter_must_match_template() {
        let mut c = cfg("bad");
        c.exec = Some("echo ${a}".into());
        c.parameters = Some(vec![ParamConfig {
            name: "other".into(),
            param_type: "string".into(),
            inject_as: None,
            option_name: None,
            description: None,
        }]);
        assert!(expand_tool(c).is_err());
    }

    #[test]
    fn canonical_form_converts_injection_modes() {
        let mut c = cfg("grep");
        c.command = Some(vec!["grep".into()]);
        c.parameters = Some(vec![
            ParamConfig {
                name: "pattern".into(),
                param_type: "string".into(),
                inject_as: Some("option".into()),
                option_name: Some("-e".into()),
                description: None,
            },
            ParamConfig {
                name: "file".into(),
                param_type: "string".into(),
                inject_as: None,
                option_name: None,
                description: None,
            },
        ]);
        let def = expand_tool(c).unwrap();
        assert_eq!(
            def.parameters[0].inject,
            Injection::Option {
                option_name: "-e".into()
            }
        );
        assert_eq!(def.parameters[1].inject, Injection::Argument);
    }

    #[test]
    fn canonical_option_without_name_rejected() {
        let mut c = cfg("bad");
        c.command = Some(vec!["grep".into()]);
        c.parameters = Some(vec![ParamConfig {
            name: "pattern".into(),
            param_type: "string".into(),
            inject_as: Some("option".into()),
            option_name: None,
            description: None,
        }]);
        assert!(expand_tool(c).is_err());
    }

    #[test]
    fn exactly_one_form_required() {
        let mut c = cfg("bad");
        c.exec = Some("echo hi".into());
        c.shell = Some("echo hi".into());
        assert!(expand_tool(c).is_err());

        let c2 = cfg("empty");
        assert!(expand_tool(c2).is_err());
    }

    #[test]
    fn duplicate_placeholder_inferred_once() {
        let mut c = cfg("twice");
        c.exec = Some("cp ${path} ${path}.bak".into());
        let def = expand_tool(c).unwrap();
        assert_eq!(def.parameters.len(), 1);
    }
}
