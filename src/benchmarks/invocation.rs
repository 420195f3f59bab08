use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// A benchmark executable and its argument list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl BenchInvocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build an invocation from an argument template.
    ///
    /// Every `{name}` placeholder found in `params` is replaced by its value,
    /// then the result is split on whitespace.
    pub fn from_template(
        program: impl Into<String>,
        template: &str,
        params: &HashMap<String, String>,
    ) -> Self {
        let mut args = template.to_string();
        for (var, value) in params {
            let placeholder = format!("{{{}}}", var);
            args = args.replace(&placeholder, value);
        }
        Self::new(
            program,
            args.split_whitespace().map(str::to_string).collect(),
        )
    }

    /// Hex SHA-256 of the serialized invocation.
    ///
    /// Program and arguments are serialized as a structure, so moving text
    /// between them or across argument boundaries changes the key.
    pub fn cache_key(&self) -> String {
        let serialized = serde_json::json!({
            "program": self.program,
            "args": self.args,
        })
        .to_string();
        format!("{:x}", Sha256::digest(serialized.as_bytes()))
    }

    /// The command as it would be typed in a shell
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
