use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use relay_core::{RelayError, Result};
use serde_json::Value;
use std::env;

// ${VAR} or ${VAR:-default}
static ENV_VAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("Invalid regex pattern")
});

/// Recursively substitute environment variables in every string of a JSON value
pub fn substitute_env_vars(value: &mut Value) -> Result<()> {
    let mut missing = Vec::new();
    substitute_value(value, &mut missing);

    if missing.is_empty() {
        return Ok(());
    }

    missing.sort();
    missing.dedup();
    Err(RelayError::Config(format!(
        "Missing required environment variables: {}. Set them or give a ${{VAR:-default}} fallback.",
        missing.join(", ")
    )))
}

fn substitute_value(value: &mut Value, missing: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if ENV_VAR_REGEX.is_match(s) {
                *s = substitute_in_string(s, missing);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                substitute_value(v, missing);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                substitute_value(v, missing);
            }
        }
        _ => {}
    }
}

fn substitute_in_string(input: &str, missing: &mut Vec<String>) -> String {
    ENV_VAR_REGEX
        .replace_all(input, |cap: &Captures| {
            let var_name = &cap[1];
            match env::var(var_name) {
                Ok(value) => value,
                Err(_) => match cap.get(2) {
                    Some(default) => default.as_str().to_string(),
                    None => {
                        missing.push(var_name.to_string());
                        String::new()
                    }
                },
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitute_env_vars() {
        env::set_var("RELAY_TEST_HOST", "localhost:9000");

        let mut value = json!({
            "endpoints": ["http://${RELAY_TEST_HOST}/invocations"],
            "api_key": "${RELAY_TEST_UNSET_KEY:-fallback}",
            "timeout_secs": 30,
            "nested": { "value": "${RELAY_TEST_HOST}" }
        });

        substitute_env_vars(&mut value).unwrap();

        assert_eq!(value["endpoints"][0], "http://localhost:9000/invocations");
        assert_eq!(value["api_key"], "fallback");
        assert_eq!(value["timeout_secs"], 30);
        assert_eq!(value["nested"]["value"], "localhost:9000");

        env::remove_var("RELAY_TEST_HOST");
    }

    #[test]
    fn test_missing_variable_without_default() {
        let mut value = json!({ "api_key": "${RELAY_TEST_DEFINITELY_MISSING}" });
        let err = substitute_env_vars(&mut value).unwrap_err();
        assert!(err.to_string().contains("RELAY_TEST_DEFINITELY_MISSING"));
    }

    #[test]
    fn test_empty_default() {
        let mut value = json!("${RELAY_TEST_EMPTY_DEFAULT:-}");
        substitute_env_vars(&mut value).unwrap();
        assert_eq!(value, "");
    }
}
